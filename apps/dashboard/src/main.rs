use std::{io::Write, sync::Arc, time::Duration};

use anyhow::Result;
use clap::Parser;
use client_core::{
    ClientEvent, DashboardClient, SortKey, SortProjection, SystemClock, TaskHandle,
};
use shared::domain::{Medication, MedicationDraft, MedicationId};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::warn;

mod config;

#[derive(Parser, Debug)]
#[command(about = "Terminal dashboard for the CuidaMed medication service")]
struct Args {
    /// Service base URL; overrides dashboard.toml and CUIDAMED_SERVER_URL.
    #[arg(long)]
    server_url: Option<String>,
    /// Password for a fresh login; omitted, a stored session is resumed or a
    /// prompt is shown.
    #[arg(long)]
    password: Option<String>,
    /// Do not persist the session token across restarts.
    #[arg(long)]
    no_remember: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let args = Args::parse();

    let mut settings = config::load_settings();
    if let Some(url) = args.server_url {
        settings.server_url = url;
    }
    if args.no_remember {
        settings.remember_me = false;
    }

    let client = DashboardClient::connect(settings.server_url.clone());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    if client.resume_session().await {
        println!("resumed stored session");
    } else {
        let password = match args.password {
            Some(password) => password,
            None => prompt(&mut lines, "password: ").await?,
        };
        client.login(&password, settings.remember_me).await?;
        println!("logged in");
    }

    let sync = client
        .start_sync(Duration::from_secs(settings.poll_interval_secs))
        .await?;
    if let Some(notice) = &sync.notice {
        println!("{notice}");
    }
    let ticker = client.start_alarm_ticker(Arc::new(SystemClock));
    let printer = spawn_event_printer(&client);

    println!("{HELP}");
    let mut projection = SortProjection::new();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if !run_command(&client, &mut projection, &mut lines, line.trim()).await? {
                    break;
                }
            }
        }
    }

    sync.handle.cancel();
    ticker.cancel();
    printer.cancel();
    Ok(())
}

const HELP: &str = "commands:
  list                                     show medications (current sort)
  sort <name|dose|stock|min|expiry|days>   sort by column; repeat to flip
  history                                  show stock movements
  confirm                                  confirm the active dose alarm
  add <name> <dose> <stock> <min> <hh:mm,hh:mm>
  update <id> <name> <dose> <stock> <min> <hh:mm,hh:mm>
  delete <id>                              delete after confirmation
  quit";

fn spawn_event_printer(client: &Arc<DashboardClient>) -> TaskHandle {
    let mut events = client.subscribe_events();
    let task = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                ClientEvent::MedicationsUpdated | ClientEvent::HistoryUpdated => {}
                ClientEvent::AlarmTriggered { name, .. } => {
                    println!("\n*** time to take {name} -- type `confirm` ***");
                }
                ClientEvent::AlarmCleared => println!("alarm cleared"),
                ClientEvent::SessionInvalidated => {
                    println!("session is no longer valid; restart and log in again");
                }
                ClientEvent::Error(message) => println!("error: {message}"),
            }
        }
    });
    TaskHandle::from(task)
}

/// Returns `false` when the user asked to quit.
async fn run_command(
    client: &Arc<DashboardClient>,
    projection: &mut SortProjection,
    lines: &mut Lines<BufReader<Stdin>>,
    line: &str,
) -> Result<bool> {
    let mut parts = line.split_whitespace();
    match parts.next() {
        None => {}
        Some("quit") | Some("exit") => return Ok(false),
        Some("list") => print_medications(client, projection).await,
        Some("sort") => match parts.next().and_then(parse_sort_key) {
            Some(key) => {
                projection.request_sort(key);
                print_medications(client, projection).await;
            }
            None => println!("usage: sort <name|dose|stock|min|expiry|days>"),
        },
        Some("history") => {
            for entry in client.history_snapshot().await {
                println!(
                    "{}  {:<24} {:>4}  {}",
                    entry.timestamp.format("%Y-%m-%d %H:%M"),
                    entry.medication_name,
                    entry.quantity_delta,
                    entry.movement_type
                );
            }
        }
        Some("confirm") => {
            if let Err(err) = client.confirm_active_alarm().await {
                println!("confirm failed: {err}");
            }
        }
        Some("add") => match parse_draft(parts.collect::<Vec<_>>()) {
            Some(draft) => match client.create_medication(&draft).await {
                Ok(created) => println!("created {} ({})", created.name, created.id),
                Err(err) => println!("create failed: {err}"),
            },
            None => println!("usage: add <name> <dose> <stock> <min> <hh:mm,hh:mm>"),
        },
        Some("update") => {
            let id = parts.next().map(MedicationId::from);
            match (id, parse_draft(parts.collect::<Vec<_>>())) {
                (Some(id), Some(draft)) => match client.update_medication(&id, &draft).await {
                    Ok(updated) => println!("updated {}", updated.name),
                    Err(err) => println!("update failed: {err}"),
                },
                _ => println!("usage: update <id> <name> <dose> <stock> <min> <hh:mm,hh:mm>"),
            }
        }
        Some("delete") => match parts.next() {
            Some(raw_id) => {
                let answer = prompt(lines, &format!("delete {raw_id}? [y/N] ")).await?;
                if answer.eq_ignore_ascii_case("y") {
                    match client.delete_medication(&MedicationId::from(raw_id)).await {
                        Ok(()) => println!("deleted"),
                        Err(err) => println!("delete failed: {err}"),
                    }
                }
            }
            None => println!("usage: delete <id>"),
        },
        Some(other) => {
            warn!(command = other, "unknown command");
            println!("{HELP}");
        }
    }
    Ok(true)
}

async fn print_medications(client: &Arc<DashboardClient>, projection: &mut SortProjection) {
    let (generation, medications) = client.medications_snapshot().await;
    for med in projection.project(generation, &medications) {
        println!("{}", format_medication(med));
    }
}

fn format_medication(med: &Medication) -> String {
    let expiry = med
        .expiration_date
        .map(|d| d.to_string())
        .unwrap_or_else(|| "-".to_string());
    let days = med
        .days_remaining
        .map(|d| d.to_string())
        .unwrap_or_else(|| "-".to_string());
    let low = if med.is_low_stock() { "  LOW STOCK" } else { "" };
    format!(
        "{:<10} {:<24} {:<10} {:>3}/{:<3} {:<18} exp {expiry} ({days} d){low}",
        med.id,
        med.name,
        med.dose,
        med.current_stock,
        med.min_stock,
        med.scheduled_times.join(",")
    )
}

fn parse_sort_key(raw: &str) -> Option<SortKey> {
    match raw {
        "name" => Some(SortKey::Name),
        "dose" => Some(SortKey::Dose),
        "stock" => Some(SortKey::CurrentStock),
        "min" => Some(SortKey::MinStock),
        "expiry" => Some(SortKey::ExpirationDate),
        "days" => Some(SortKey::DaysRemaining),
        _ => None,
    }
}

fn parse_draft(fields: Vec<&str>) -> Option<MedicationDraft> {
    let [name, dose, stock, min_stock, times] = fields.as_slice() else {
        return None;
    };
    Some(MedicationDraft {
        name: name.to_string(),
        dose: dose.to_string(),
        current_stock: stock.parse().ok()?,
        min_stock: min_stock.parse().ok()?,
        scheduled_times: times.split(',').map(str::to_string).collect(),
        expiration_date: None,
    })
}

async fn prompt(lines: &mut Lines<BufReader<Stdin>>, message: &str) -> Result<String> {
    print!("{message}");
    std::io::stdout().flush()?;
    Ok(lines.next_line().await?.unwrap_or_default().trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_parses_the_five_field_form() {
        let draft = parse_draft(vec!["Paracetamol", "500mg", "12", "4", "08:00,20:00"])
            .expect("draft");
        assert_eq!(draft.name, "Paracetamol");
        assert_eq!(draft.current_stock, 12);
        assert_eq!(draft.scheduled_times, vec!["08:00", "20:00"]);
    }

    #[test]
    fn draft_rejects_wrong_arity_and_bad_numbers() {
        assert!(parse_draft(vec!["Paracetamol", "500mg", "12", "4"]).is_none());
        assert!(parse_draft(vec!["Paracetamol", "500mg", "lots", "4", "08:00"]).is_none());
    }

    #[test]
    fn sort_keys_cover_every_column() {
        for raw in ["name", "dose", "stock", "min", "expiry", "days"] {
            assert!(parse_sort_key(raw).is_some(), "unmapped key {raw}");
        }
        assert!(parse_sort_key("color").is_none());
    }

    #[test]
    fn low_stock_marker_appears_at_the_boundary() {
        let mut med = Medication {
            id: MedicationId::from("a"),
            name: "A".to_string(),
            dose: "1".to_string(),
            current_stock: 4,
            min_stock: 4,
            scheduled_times: vec!["08:00".to_string()],
            expiration_date: None,
            days_remaining: None,
        };
        assert!(format_medication(&med).contains("LOW STOCK"));
        med.current_stock = 5;
        assert!(!format_medication(&med).contains("LOW STOCK"));
    }
}
