use std::path::PathBuf;

use anyhow::{bail, Context};
use bytes::Bytes;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use bucketfs_mount::{
    BucketfsConfig, ClientPool, Content, EnvSecrets, Lookup, MountTable, ReadOptions,
    WriteOutcome,
};

const DEFAULT_CONFIG_PATH: &str = "bucketfs.toml";

const USAGE: &str = "usage: bucketfs [--config <path>] <command>

commands:
  read <name> [--regex] [--all]   print the records a name resolves to
  ls <dir/>                       list a directory
  write <name> <local-file>       upload a local file";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();

    let mut config_path = PathBuf::from(DEFAULT_CONFIG_PATH);
    if let Some(pos) = args.iter().position(|a| a == "--config") {
        let Some(path) = args.get(pos + 1).cloned() else {
            bail!("--config requires a path\n\n{}", USAGE);
        };
        config_path = PathBuf::from(path);
        args.drain(pos..=pos + 1);
    }

    let config = BucketfsConfig::load(&config_path)?;
    info!(
        config = %config_path.display(),
        mounts = config.mounts.len(),
        "bucketfs configured"
    );
    let table = MountTable::from_config(&config, ClientPool::global());

    match args.first().map(String::as_str) {
        Some("read") => {
            let Some(name) = args.get(1) else {
                bail!("read requires a name\n\n{}", USAGE);
            };
            let flags = &args[2..];
            let options = ReadOptions::from_args(
                flags.iter().any(|f| f == "--regex").then_some("regex"),
                flags.iter().any(|f| f == "--all").then_some("all"),
            );
            read(&table, name, &options).await
        }
        Some("ls") => {
            let Some(dir) = args.get(1) else {
                bail!("ls requires a directory\n\n{}", USAGE);
            };
            let dir = if dir.ends_with('/') {
                dir.clone()
            } else {
                format!("{}/", dir)
            };
            read(&table, &dir, &ReadOptions::new()).await
        }
        Some("write") => {
            let (Some(name), Some(file)) = (args.get(1), args.get(2)) else {
                bail!("write requires a name and a local file\n\n{}", USAGE);
            };
            let data = tokio::fs::read(file)
                .await
                .with_context(|| format!("Failed to read {}", file))?;
            match table.write(name, Bytes::from(data), &EnvSecrets).await? {
                WriteOutcome::Written => {
                    info!(name = %name, "Written");
                    Ok(())
                }
                WriteOutcome::NotHandled => bail!("No mount handles {}", name),
            }
        }
        _ => bail!("{}", USAGE),
    }
}

async fn read(table: &MountTable, name: &str, options: &ReadOptions) -> anyhow::Result<()> {
    let records = match table.read(name, options, &EnvSecrets).await? {
        Lookup::Found(output) => output.into_records(),
        Lookup::Missing => bail!("{}: not found", name),
        Lookup::NotHandled => bail!("{}: no mount handles this name", name),
    };

    debug!(name, count = records.len(), "Read complete");
    for record in records {
        match record
            .read()
            .await
            .with_context(|| format!("Failed to read {}", record.name))?
        {
            Content::Text(text) => println!("{}", text),
            Content::Bytes(bytes) => println!(
                "<{}: {} bytes of {}>",
                record.name,
                bytes.len(),
                record.mimetype.as_deref().unwrap_or("unknown type")
            ),
        }
    }
    Ok(())
}
