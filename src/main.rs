//!
//! gallery-auth demo binary
//! ------------------------
//! Interactive shell around a rated item gallery and its user session widget.
//! Without `GALLERY_AUTH_URL` the session logs in against an offline static
//! gateway as the current OS user.

use std::sync::Arc;

use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use gallery_auth::config::AppConfig;
use gallery_auth::gallery::{Gallery, GalleryData};
use gallery_auth::identity::{
    is_valid_key, AuthGateway, ChangeCallback, HttpAuthGateway, SessionDeps, StaticAuthGateway, StdinNotifier, Suppress,
};
use gallery_auth::storage::{KvSessionStore, SessionStore};

const HELP: &str = "Commands:\n  login                 log in (reuses a persisted session)\n  logout                log out\n  click                 press the login/logout button\n  rate <item> <stars>   rate item (1-based) with 1..5 stars\n  show                  print gallery markup\n  whoami                print the current user\n  end                   end the browsing session (forget persisted records)\n  help                  show this help\n  quit | exit           leave";

fn offline_user() -> String {
    let name: String = whoami::username()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if is_valid_key(&name) { name } else { "guest".to_string() }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).init();

    let app = AppConfig::from_env()?;
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "gallery_auth",
        "gallery-auth starting: RUST_LOG='{}', gateway={}, session_file={}",
        rust_log,
        app.gateway_url.as_deref().unwrap_or("<offline>"),
        app.session_file.as_ref().map(|p| p.display().to_string()).unwrap_or_else(|| "<memory>".to_string())
    );

    let gateway: Arc<dyn AuthGateway> = match &app.gateway_url {
        Some(url) => Arc::new(HttpAuthGateway::new(url)?),
        None => Arc::new(StaticAuthGateway::single_user(&offline_user())),
    };
    let store = Arc::new(match &app.session_file {
        Some(path) => KvSessionStore::with_snapshot(path, app.session_idle)?,
        None => KvSessionStore::default(),
    });
    let deps = SessionDeps::new(gateway, store.clone() as Arc<dyn SessionStore>, Arc::new(StdinNotifier));

    let user_config = app.load_user_config()?.with_onchange(ChangeCallback::from_fn(|logged_in| {
        println!("User has logged {}.", if logged_in { "in" } else { "out" });
    }));
    let data = match &app.gallery_data {
        Some(path) => GalleryData::from_path(path)?,
        None => GalleryData::animals(),
    };
    let gallery = Gallery::create(data, user_config, deps, None).await?;
    let session = gallery.session()?;

    let mut rl = DefaultEditor::new()?;
    println!("{}", HELP);
    loop {
        let line = match rl.readline("gallery> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        let line = line.trim();
        if line.is_empty() { continue; }
        let _ = rl.add_history_entry(line);
        let parts: Vec<&str> = line.split_whitespace().collect();
        let outcome = match parts.as_slice() {
            ["quit"] | ["exit"] => break,
            ["help"] => { println!("{}", HELP); Ok(()) }
            ["login"] => session.login(Suppress::None).await.map(|rec| {
                println!("logged in as {}", rec.key().unwrap_or_default());
            }),
            ["logout"] => session.logout(Suppress::None).await,
            ["click"] => session.click().await.map(|action| println!("button: {:?}", action)),
            ["rate", item, stars] => match (item.parse::<usize>(), stars.parse::<u8>()) {
                (Ok(item), Ok(stars)) if item >= 1 => gallery.rate(item - 1, stars).await,
                _ => { println!("usage: rate <item> <stars>"); Ok(()) }
            },
            ["show"] => { println!("{}", gallery.markup()); Ok(()) }
            ["whoami"] => {
                match session.username() {
                    Some(name) => println!("{} (realm {})", name, session.realm()),
                    None => println!("not logged in (realm {})", session.realm()),
                }
                Ok(())
            }
            ["end"] => store.end_session(),
            _ => { println!("unknown command; type 'help'"); Ok(()) }
        };
        if let Err(e) = outcome {
            eprintln!("error: {}", e);
        }
    }
    Ok(())
}
