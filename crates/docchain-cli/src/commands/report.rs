//! Read-only ledger reports.

use clap::Args;
use serde::Serialize;

use docchain::{Config, LedgerReports};

#[derive(Args)]
pub struct OutputArgs {
    /// Print JSON instead of text
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
pub struct CounterpartiesArgs {
    /// Only counterparties whose name or tax id contains this text
    #[arg(short, long)]
    filter: Option<String>,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args)]
pub struct ChainArgs {
    /// Contract number of the chain
    contract_number: String,

    #[command(flatten)]
    output: OutputArgs,
}

pub fn counterparties(args: CounterpartiesArgs, config: &Config) -> anyhow::Result<()> {
    let ledger = super::open_ledger(config)?;
    let rows = ledger.list_counterparties(args.filter.as_deref())?;
    if args.output.json {
        return print_json(&rows);
    }

    if rows.is_empty() {
        println!("No counterparties");
    }
    for row in &rows {
        let cp = &row.counterparty;
        println!(
            "{} ({}): {} documents, {:.2} total",
            cp.name,
            or_dash(cp.tax_id.as_deref()),
            cp.document_count,
            cp.total_amount
        );
        println!(
            "    contracts {} / {:.2}, invoices {} / {:.2}, closing {} / {:.2}",
            row.contract_count,
            row.contract_amount,
            row.invoice_count,
            row.invoice_amount,
            row.closing_count,
            row.closing_amount
        );
    }
    Ok(())
}

pub fn chains(args: OutputArgs, config: &Config) -> anyhow::Result<()> {
    let ledger = super::open_ledger(config)?;
    let chains = ledger.list_unclosed_chains()?;
    if args.json {
        return print_json(&chains);
    }

    if chains.is_empty() {
        println!("No open chains");
    }
    for chain in &chains {
        println!(
            "{:<20} {:<30} {:>14.2} {:>14.2} {:>14.2}  {}",
            chain.contract_number,
            chain.counterparty,
            chain.total_amount,
            chain.closed_amount,
            chain.remaining_amount,
            chain.status.as_str()
        );
    }
    Ok(())
}

pub fn chain(args: ChainArgs, config: &Config) -> anyhow::Result<()> {
    let ledger = super::open_ledger(config)?;
    let Some(detail) = ledger.chain_detail(&args.contract_number)? else {
        anyhow::bail!("No chain for contract {}", args.contract_number);
    };
    if args.output.json {
        return print_json(&detail);
    }

    let chain = &detail.chain;
    println!("Contract {} with {}", chain.contract_number, chain.counterparty);
    println!("Status:    {}", chain.status.as_str());
    println!("Total:     {:.2}", chain.total_amount);
    println!("Closed:    {:.2}", chain.closed_amount);
    println!("Remaining: {:.2}", chain.remaining_amount);
    println!(
        "Invoices: {}, closing documents: {}\n",
        detail.invoice_count, detail.closing_count
    );
    for doc in &detail.documents {
        println!(
            "{:<10} {:<20} {:<12} {:>14}",
            doc.link_type.as_str(),
            or_dash(doc.document_number.as_deref()),
            or_dash(doc.date.as_deref()),
            doc.amount.map(|a| format!("{:.2}", a)).unwrap_or_default()
        );
    }
    Ok(())
}

pub fn stats(args: OutputArgs, config: &Config) -> anyhow::Result<()> {
    let ledger = super::open_ledger(config)?;
    let stats = ledger.database_stats()?;
    if args.json {
        return print_json(&stats);
    }

    println!("Documents:        {}", stats.documents);
    println!("Counterparties:   {}", stats.counterparties);
    println!("Chains:           {} ({} open)", stats.chains, stats.unclosed_chains);
    println!("Document total:   {:.2}", stats.total_document_amount);
    println!("Open remaining:   {:.2}", stats.unclosed_remaining_amount);
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn or_dash(value: Option<&str>) -> &str {
    value.unwrap_or("-")
}
