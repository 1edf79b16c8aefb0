use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use vpnshop_db::StoreError;
use vpnshop_db::models::order::Order;

use crate::AppState;

pub async fn print_stats(state: &AppState) -> Result<()> {
    let users = state.users.count().await.context("Failed to count users")?;
    let totals = state.order_repo.totals().await.context("Failed to load order totals")?;

    println!("\n=== VPN SHOP STATS ===");
    println!("Users:      {}", users);
    println!("Orders:     {}", totals.orders);
    println!("Paid:       {}", totals.successful);
    println!("Income:     {} {}", totals.income, state.settings.currency);
    println!("======================\n");

    let recent = state.order_repo.recent(10).await.context("Failed to load recent orders")?;
    for order in &recent {
        print_order_line(order);
    }
    Ok(())
}

pub async fn print_order(state: &AppState, order_id: &str) -> Result<()> {
    match state.order_repo.get_by_order_id(order_id).await {
        Ok(order) => {
            print_order_details(state, &order);
            Ok(())
        }
        Err(StoreError::NotFound) => Err(anyhow::anyhow!("Order {} not found", order_id)),
        Err(e) => Err(e).context("Failed to load order"),
    }
}

/// Asks the gateway about a pending order and applies a settled result.
pub async fn poll_order(state: &AppState, order_id: &str) -> Result<()> {
    let before = state
        .order_repo
        .get_by_order_id(order_id)
        .await
        .with_context(|| format!("Failed to load order {}", order_id))?;

    let after = state
        .orders
        .refresh_status(order_id)
        .await
        .with_context(|| format!("Failed to refresh order {}", order_id))?;

    if before.status == after.status {
        println!("Order {} is still {}.", order_id, after.status);
    } else {
        println!("Order {}: {} -> {}", order_id, before.status, after.status);
    }
    print_order_details(state, &after);
    Ok(())
}

fn print_order_line(order: &Order) {
    println!(
        "{:<32} {:<8} {:>8} {:<4} owner={} {}",
        order.order_id,
        order.status,
        order.amount,
        order.currency,
        order.owner_id,
        order.created_at.format("%Y-%m-%d %H:%M")
    );
}

fn print_order_details(state: &AppState, order: &Order) {
    println!("Order:        {}", order.order_id);
    println!("Owner:        {}", order.owner_id);
    println!("Amount:       {} {}", order.amount, order.currency);
    println!("Status:       {}", order.status);
    println!(
        "Transaction:  {}",
        order.external_transaction_id.as_deref().unwrap_or("-")
    );
    println!("Created:      {}", order.created_at.to_rfc3339());
    if let Some(completed) = order.completed_at {
        println!("Completed:    {}", completed.to_rfc3339());
    }
    if order.is_paid() {
        println!("Access page:  {}", state.orders.deliverable_url(&order.fulfillment_token));
    }
}

/// How `install` lays out the systemd unit.
#[derive(Debug, Clone)]
pub struct InstallOptions {
    pub unit_name: String,
    pub user: String,
    pub config: Option<PathBuf>,
    pub dry_run: bool,
}

/// Renders the unit. The service writes its database and `server.log` into
/// the working directory, so that is the only writable path.
pub fn service_unit(opts: &InstallOptions, exe: &Path, working_dir: &Path) -> String {
    let mut exec = exe.display().to_string();
    if let Some(config) = &opts.config {
        exec.push_str(&format!(" --config {}", config.display()));
    }
    exec.push_str(" serve");

    let dir = working_dir.display();
    [
        "[Unit]".to_string(),
        "Description=VPN shop: Telegram bot and payment webhook".to_string(),
        "Wants=network-online.target".to_string(),
        "After=network-online.target".to_string(),
        String::new(),
        "[Service]".to_string(),
        format!("User={}", opts.user),
        format!("WorkingDirectory={}", dir),
        format!("EnvironmentFile=-{}/.env", dir),
        format!("ExecStart={}", exec),
        "Restart=on-failure".to_string(),
        "RestartSec=5".to_string(),
        "NoNewPrivileges=true".to_string(),
        "ProtectSystem=strict".to_string(),
        format!("ReadWritePaths={}", dir),
        String::new(),
        "[Install]".to_string(),
        "WantedBy=multi-user.target".to_string(),
    ]
    .join("\n")
        + "\n"
}

pub fn install_service(opts: &InstallOptions) -> Result<()> {
    let exe = env::current_exe().context("Cannot locate the running executable")?;
    let working_dir = env::current_dir()?;
    let unit = service_unit(opts, &exe, &working_dir);

    if opts.dry_run {
        print!("{}", unit);
        return Ok(());
    }

    if unsafe { libc::getuid() } != 0 {
        anyhow::bail!("Writing to /etc/systemd/system needs root; rerun with sudo or use --dry-run");
    }

    let unit_path = PathBuf::from(format!("/etc/systemd/system/{}.service", opts.unit_name));
    fs::write(&unit_path, unit).with_context(|| format!("Failed to write {}", unit_path.display()))?;

    println!("Installed {}", unit_path.display());
    println!("Make sure user '{}' can read {}, then run:", opts.user, working_dir.display());
    println!("  systemctl daemon-reload && systemctl enable --now {}", opts.unit_name);
    Ok(())
}
