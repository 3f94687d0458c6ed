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
    const DISPLAY_ENVS: [&str; 19] = [
        "RUST_LOG",
        "CPG_HOST",
        "CPG_PORT",
        "CPG_DATABASE_URL",
        "CPG_DB_MAX_CONNECTIONS",
        "CPG_USE_X_FORWARDED_FOR",
        "CPG_USE_FORWARDED",
        "CPG_GATEWAY_IP_WHITELIST",
        "CPG_RECONCILE_INTERVAL_MINUTES",
        "CPG_JWT_VERIFICATION_KEY",
        "CPG_MAIL_RELAY_URL",
        "CPG_MAIL_FROM",
        "CPG_ECPAY_MERCHANT_ID",
        "CPG_ECPAY_ENVIRONMENT",
        "CPG_ECPAY_CHECKOUT_URL",
        "CPG_ECPAY_QUERY_URL",
        "CPG_ECPAY_RETURN_URL",
        "CPG_ECPAY_CLIENT_BACK_URL",
        "CPG_ECPAY_UTC_OFFSET",
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
