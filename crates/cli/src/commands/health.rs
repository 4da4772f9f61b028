//! `ontime health`: liveness and readiness of the service

use anyhow::Result;
use colored::Colorize;
use serde_json::json;
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{color_status, print_json, print_rows, OutputFormat};

#[derive(Tabled)]
struct ComponentRow {
    #[tabled(rename = "Component")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Message")]
    message: String,
}

pub async fn run(api_url: &str, format: OutputFormat) -> Result<()> {
    let client = ApiClient::new(api_url)?;
    let health = client.health().await?;
    let readiness = client.readiness().await?;

    if format == OutputFormat::Json {
        return print_json(&json!({ "health": health, "readiness": readiness }));
    }

    println!("{} {}", "Service:".bold(), color_status(health.status.as_str()));

    print_rows(
        health
            .components
            .iter()
            .map(|(name, component)| ComponentRow {
                name: name.to_string(),
                status: color_status(component.status.as_str()),
                message: component.message.clone().unwrap_or_default(),
            })
            .collect(),
    );

    if readiness.ready {
        println!("{} {}", "Readiness:".bold(), color_status("ready"));
    } else {
        println!(
            "{} {} ({})",
            "Readiness:".bold(),
            color_status("not ready"),
            readiness.reason.as_deref().unwrap_or("unknown")
        );
    }
    Ok(())
}
