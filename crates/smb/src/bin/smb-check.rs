//! Connectivity check: verifies the configured token with `getMe`.

use smb_core::config::Config;
use smb_telegram::router::{build_bot, check_token};

#[tokio::main]
async fn main() {
    if let Err(e) = smb_core::logging::init("smb_check") {
        eprintln!("{e}");
    }

    let cfg = match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("ERROR: {e}");
            std::process::exit(1);
        }
    };

    let checked = match build_bot(&cfg) {
        Ok(bot) => check_token(&bot).await,
        Err(e) => Err(e),
    };
    match checked {
        Ok(username) => {
            println!("Bot instance created successfully.");
            println!("Bot username: @{username}");
        }
        Err(e) => {
            eprintln!("ERROR calling getMe: {e}");
            std::process::exit(1);
        }
    }
}
