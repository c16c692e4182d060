use super::{Cli, Command, RunArgs};
use anyhow::{Context, Result};
use event_archiver::json::{parse_documents, to_documents};
use event_archiver::{ArchivalJob, ArchiverConfig, DocumentDb, ReportWriter};
use std::path::Path;
use std::sync::Arc;

pub struct App {
    cli: Cli,
}

impl App {
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    fn config(&self) -> ArchiverConfig {
        ArchiverConfig::new()
            .data_dir(&self.cli.data_dir)
            .active_collection(&self.cli.active_collection)
            .archive_collection(&self.cli.archive_collection)
            .durability(self.cli.durability)
    }

    async fn open(&self, config: &ArchiverConfig) -> Result<Arc<DocumentDb>> {
        config.validate().context("Invalid configuration")?;
        let db = DocumentDb::open(config)
            .await
            .with_context(|| format!("Failed to open store at {}", config.data_dir.display()))?;
        Ok(Arc::new(db))
    }

    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Command::Run(args) => self.archive(args).await,
            Command::Import { file } => self.import(file).await,
            Command::Export { collection, output } => {
                self.export(collection.as_deref(), output.as_deref()).await
            }
            Command::Stats => self.stats().await,
        }
    }

    async fn archive(&self, args: &RunArgs) -> Result<()> {
        let config = self
            .config()
            .inactivity_days(args.inactive_days)
            .registration_days(args.registration_days)
            .report_dir(&args.report_dir)
            .strategy(args.strategy);

        let db = self.open(&config).await?;
        let job = ArchivalJob::from_db(db.clone(), &config)?;

        if args.dry_run {
            let candidates = job.plan_at(chrono::Utc::now()).await?;
            println!("{} users would be archived", candidates.len());
            for user_id in candidates {
                println!("  {}", user_id);
            }
            return Ok(());
        }

        let report = job.run().await.context("Archival run failed")?;
        db.checkpoint().await.context("Failed to checkpoint store")?;

        let path = ReportWriter::new(&config.report_dir)
            .write(&report)
            .context("Failed to write report")?;

        println!(
            "Archived {} users, report written to {}",
            report.archived_user_count,
            path.display()
        );
        Ok(())
    }

    async fn import(&self, file: &Path) -> Result<()> {
        let config = self.config();
        let input = std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read {}", file.display()))?;
        let records = parse_documents(&input)
            .with_context(|| format!("Failed to parse {}", file.display()))?;

        let db = self.open(&config).await?;
        let count = records.len();
        db.insert_many(&config.active_collection, records).await?;
        db.checkpoint().await?;

        println!("Imported {} events into '{}'", count, config.active_collection);
        Ok(())
    }

    async fn export(&self, collection: Option<&str>, output: Option<&Path>) -> Result<()> {
        let config = self.config();
        let db = self.open(&config).await?;
        let name = collection.unwrap_or(config.archive_collection.as_str());

        let records = db.scan(name).await?;
        let rendered = to_documents(&records)?;

        match output {
            Some(path) => {
                std::fs::write(path, rendered)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!("Exported {} events from '{}'", records.len(), name);
            }
            None => println!("{}", rendered),
        }
        Ok(())
    }

    async fn stats(&self) -> Result<()> {
        let db = self.open(&self.config()).await?;
        for stats in db.stats().await? {
            println!("{}", stats);
        }
        Ok(())
    }
}
