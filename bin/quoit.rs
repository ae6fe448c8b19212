use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::anyhow;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use quoit::dht::Did;
use quoit::dht::RingNode;
use quoit::logging::init_logging;
use quoit::logging::LogLevel;
use quoit::rpc::AddressBook;
use quoit::rpc::NodeRef;
use quoit::rpc::NodeServer;
use quoit::rpc::RingClient;

#[derive(Parser, Debug)]
#[command(about, version, author)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(long, default_value_t = LogLevel::Info, value_enum, env)]
    log_level: LogLevel,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Command {
    #[command(about = "Starts a node: forms a new ring or joins through a bootstrap peer.")]
    Run(RunCommand),
    #[command(about = "Bulk-loads keys from a CSV file through one entry node.")]
    Populate(PopulateCommand),
    #[command(about = "Looks up a single key through one entry node.")]
    Query(QueryCommand),
}

#[derive(Args, Debug)]
struct RunCommand {
    #[arg(
        long,
        short = 'b',
        default_value = "127.0.0.1:0",
        help = "Address to listen on; port 0 picks a free one",
        env
    )]
    bind: SocketAddr,

    #[arg(
        long,
        help = "Address of an already-joined node; omit to start a new ring"
    )]
    bootstrap: Option<SocketAddr>,
}

#[derive(Args, Debug)]
struct PopulateCommand {
    #[arg(long, short = 'n', help = "Entry node address")]
    node: SocketAddr,

    #[arg(long, short = 'f', help = "CSV file with one record per row")]
    file: PathBuf,

    #[arg(long, default_value_t = 2500, help = "Maximum rows to load")]
    max_rows: usize,
}

#[derive(Args, Debug)]
struct QueryCommand {
    #[arg(long, short = 'n', help = "Entry node address")]
    node: SocketAddr,

    #[arg(help = "Key to look up")]
    key: String,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level);
    match cli.command {
        Command::Run(cmd) => run(cmd),
        Command::Populate(cmd) => populate(cmd),
        Command::Query(cmd) => query(cmd),
    }
}

fn run(cmd: RunCommand) -> anyhow::Result<()> {
    // No listening endpoint, no node.
    let server = NodeServer::bind(cmd.bind)?;
    let addr = server.local_addr()?;
    let me = NodeRef::from_addr(addr);

    let registry = Arc::new(AddressBook::new());
    let node = Arc::new(RingNode::new(me, registry));

    // Serve before joining: the join protocol makes peers call back here.
    let handle = server.spawn(node.clone());

    node.join(cmd.bootstrap.map(NodeRef::from_addr))?;
    let info = node.info()?;
    tracing::info!(
        "node {} listening on {}, successor {}, predecessor {:?}",
        info.did,
        addr,
        info.successor,
        info.predecessor
    );
    println!("node {} listening on {}", me.did, addr);

    handle
        .join()
        .map_err(|_| anyhow!("server thread panicked"))?;
    Ok(())
}

fn populate(cmd: PopulateCommand) -> anyhow::Result<()> {
    let entry = NodeRef::from_addr(cmd.node);
    let client = RingClient::new(Arc::new(AddressBook::new()));

    let mut reader = csv::Reader::from_path(&cmd.file)?;
    let headers = reader.headers()?.clone();

    let mut loaded = 0usize;
    for record in reader.records() {
        if loaded >= cmd.max_rows {
            break;
        }
        let record = record?;
        let key = match (record.get(0), record.get(3)) {
            (Some(a), Some(b)) => format!("{a}{b}"),
            _ => {
                tracing::warn!("row without key columns skipped");
                continue;
            }
        };
        let pairs: Vec<(String, String)> = headers
            .iter()
            .zip(record.iter())
            .filter(|(_, cell)| !cell.is_empty() && *cell != "--")
            .map(|(header, cell)| (header.to_string(), cell.to_string()))
            .collect();
        let value = serde_json::to_vec(&pairs)?;
        client.add_key(&entry, Did::hash(&key), value)?;
        loaded += 1;
    }
    println!("loaded {loaded} records into the ring via {}", cmd.node);
    Ok(())
}

fn query(cmd: QueryCommand) -> anyhow::Result<()> {
    let entry = NodeRef::from_addr(cmd.node);
    let client = RingClient::new(Arc::new(AddressBook::new()));

    let key_id = Did::hash(&cmd.key);
    tracing::info!("querying {} for key {} ({})", cmd.node, cmd.key, key_id);
    match client.get_data(&entry, key_id)? {
        Some(value) => {
            let pairs: Vec<(String, String)> = serde_json::from_slice(&value)?;
            for (tag, cell) in pairs {
                println!("{tag}: {cell}");
            }
        }
        None => println!("no record found for key {} ({})", cmd.key, key_id),
    }
    Ok(())
}
