use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // We don't expect any CLI args, so always print the help
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Be explicit about which envars to print, so as to avoid accidentally exposing secrets
    const DISPLAY_ENVS: [&str; 16] = [
        "RUST_LOG",
        "SPG_HOST",
        "SPG_PORT",
        "SPG_DATABASE_URL",
        "SPG_UNPAID_ORDER_TIMEOUT",
        "SPG_EXPIRY_INTERVAL",
        "SPG_GATEWAY_TIMEOUT",
        "SPG_DEFAULT_CURRENCY",
        "SPG_PAYSTACK_BASE_URL",
        "SPG_PAYSTACK_CALLBACK_URL",
        "SPG_PAYSTACK_CUSTOMER_EMAIL_DOMAIN",
        "SPG_PALMPAY_BASE_URL",
        "SPG_PALMPAY_MERCHANT_ID",
        "SPG_PALMPAY_APP_ID",
        "SPG_PALMPAY_CALLBACK_URL",
        "SPG_PALMPAY_NOTIFY_URL",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
