//! Terminal front end for one portal session.
//!
//! ```text
//! portal-session [config.toml] [customer|staff|admin]
//! ```
//!
//! Without a config file the backend is taken from `PARCELGATE_URL`
//! (default `http://localhost:3000`). Every line typed counts as user
//! activity; the lines below are also commands:
//!
//! ```text
//! login <username> <password>
//! logout
//! status
//! quit
//! ```

use std::sync::{Arc, Mutex};

use parcelgate::prelude::*;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Forwards terminal input to whichever session is attached.
#[derive(Clone, Default)]
struct TerminalMonitor {
    sink: Arc<Mutex<Option<ActivitySink>>>,
}

impl TerminalMonitor {
    fn keypress(&self) {
        let sink = self.sink.lock().ok().and_then(|s| s.clone());
        if let Some(sink) = sink {
            sink.record(ActivityKind::KeyPress);
        }
    }
}

impl ActivityMonitor for TerminalMonitor {
    fn attach(&mut self, _kinds: &[ActivityKind], sink: ActivitySink) {
        if let Ok(mut slot) = self.sink.lock() {
            *slot = Some(sink);
        }
    }

    fn detach(&mut self) {
        if let Ok(mut slot) = self.sink.lock() {
            *slot = None;
        }
    }
}

fn load_config(path: Option<&str>) -> Result<PortalConfig, PortalError> {
    match path {
        Some(path) => PortalConfig::from_file(path),
        None => {
            let url = std::env::var("PARCELGATE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string());
            let config = PortalConfig::new(url);
            config.validate()?;
            Ok(config)
        }
    }
}

fn describe(session: &Session) -> String {
    match session.principal() {
        Some(p) => format!("signed in as {} ({})", p.name, p.id),
        None if session.is_loading() => "checking session...".to_string(),
        None => "signed out".to_string(),
    }
}

async fn print_timers(handle: &SessionHandle) {
    match handle.timers().await {
        Ok(t) => println!(
            "  inactivity in {:?}, refresh in {:?}{}",
            t.inactivity,
            t.refresh,
            if t.refresh_in_flight { " (refreshing)" } else { "" }
        ),
        Err(e) => println!("  {e}"),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let first = args.next();
    let (config_path, role_arg) = match first.as_deref() {
        Some(arg) if arg.ends_with(".toml") => (Some(arg.to_string()), args.next()),
        _ => (None, first),
    };
    let role: Role = role_arg.as_deref().unwrap_or("customer").parse()?;

    let config = load_config(config_path.as_deref())?;
    init_tracing(&config.logging)?;

    let api = HttpAuthApi::new(
        config.base_url.clone(),
        config.endpoints(role),
        config.http_timeout(),
    )?;
    let (shell, mut effects) = ChannelShell::new();
    let monitor = TerminalMonitor::default();
    let handle = SessionManager::new(config.profile(role), Arc::new(api), shell)
        .monitor(monitor.clone())
        .spawn();

    println!("{role} portal at {}", config.base_url);
    println!("{}", describe(&handle.ready().await));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                monitor.keypress();
                let words: Vec<&str> = line.split_whitespace().collect();
                match words.as_slice() {
                    ["login", username, password] => {
                        match handle.login(Credentials::new(*username, *password)).await {
                            Ok(p) => println!("welcome, {}", p.name),
                            Err(e) => println!("login failed: {e}"),
                        }
                    }
                    ["logout"] => handle.logout().await?,
                    ["status"] => {
                        println!("{}", describe(&handle.snapshot()));
                        print_timers(&handle).await;
                    }
                    ["quit"] => break,
                    [] => {}
                    _ => println!("commands: login <user> <password> | logout | status | quit"),
                }
            }
            Some(effect) = effects.recv() => match effect {
                ShellEvent::Notify(n) => println!("[{:?}] {}", n.level, n.message),
                ShellEvent::Navigate(nav) => println!("-> {}", nav.route),
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    handle.shutdown().await?;
    tracing::info!("bye");
    Ok(())
}
