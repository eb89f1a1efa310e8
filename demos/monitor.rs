use std::env;
use std::sync::Arc;

use tech_emodul::{ClimateState, Coordinator, CoordinatorState, PresetSelector, TechClient};

#[tokio::main]
async fn main() -> tech_emodul::Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let (Some(username), Some(password)) = (args.get(1), args.get(2)) else {
        eprintln!("usage: monitor <username> <password> [udid]");
        std::process::exit(2);
    };

    let client = Arc::new(TechClient::builder().build()?);
    if !client.authenticate(username, password).await? {
        eprintln!("Invalid credentials");
        std::process::exit(1);
    }

    let modules = client.list_modules().await?;
    for module in &modules {
        println!("{} [{}] {}", module.name, module.kind, module.udid);
    }
    let module = match args.get(3) {
        Some(udid) => modules.iter().find(|m| &m.udid == udid),
        None => modules.first(),
    };
    let Some(module) = module else {
        eprintln!("No matching module");
        std::process::exit(1);
    };

    let coordinator = Coordinator::new(Arc::clone(&client), module.udid.clone());
    let udid = module.udid.clone();
    coordinator.subscribe(move |snapshot| {
        for element in snapshot.zones.values() {
            let state = ClimateState::from_zone(&udid, element);
            let fmt_temp = |t: Option<tech_emodul::Temperature>| {
                t.map_or_else(|| "--".to_string(), |t| t.to_string())
            };
            println!(
                "[{}] {} / {} | mode: {:?} | action: {:?}{}",
                state.name,
                fmt_temp(state.current_temperature),
                fmt_temp(state.target_temperature),
                state.hvac_mode,
                state.hvac_action,
                state
                    .humidity
                    .map(|h| format!(" | {h}%"))
                    .unwrap_or_default(),
            );
        }
    });

    println!("Monitoring {}...", module.name);
    if let Err(e) = coordinator.first_refresh().await {
        eprintln!("Initial refresh failed: {e}");
        std::process::exit(1);
    }

    let selector = PresetSelector::new(coordinator.clone(), module.name.clone());
    if let Some(label) = selector.state().label() {
        println!("Heating mode: {label}");
    }

    let mut state = coordinator.watch_state();
    loop {
        if state.changed().await.is_err() {
            break;
        }
        let current = *state.borrow_and_update();
        match current {
            CoordinatorState::Failed => eprintln!("Refresh failed, retrying next interval"),
            CoordinatorState::AuthRequired => {
                println!("Session expired, re-authenticating...");
                if !client.authenticate(username, password).await? {
                    eprintln!("Invalid credentials");
                    break;
                }
                coordinator.start();
            }
            CoordinatorState::Stopped => break,
            CoordinatorState::Pending | CoordinatorState::Ready => {}
        }
    }

    coordinator.shutdown();
    Ok(())
}
