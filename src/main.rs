//! CLI entry point for the RUL training pipelines.
//!
//! Subcommands:
//!   pretrain-recurrent -- Train the LSTM branch alone on the sensor histories
//!   train-image        -- Train the regression head over a frozen backbone
//!   train-hybrid       -- Fuse both branches and train the fusion head
//!   write-config       -- Write the default run configuration as JSON

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use hybrid_rul::config::RunConfig;
use hybrid_rul::pipeline;
use hybrid_rul::{Device, Result, TrainConfig};

#[derive(Parser)]
#[command(name = "hybrid-rul", about = "Hybrid LSTM + transfer-learning RUL training")]
struct Cli {
    /// Run configuration (JSON). Defaults are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Command,
}

/// Values applied on top of the configuration file, to every training stage.
#[derive(Args)]
struct Overrides {
    /// Maximum training epochs.
    #[arg(long, global = true)]
    epochs: Option<usize>,

    /// Mini-batch size.
    #[arg(long, global = true)]
    batch_size: Option<usize>,

    /// Initial learning rate.
    #[arg(long, global = true)]
    lr: Option<f64>,

    /// Early stopping patience (epochs without improvement).
    #[arg(long, global = true)]
    patience: Option<usize>,

    /// Compute device: auto, cpu or cuda.
    #[arg(long, global = true)]
    device: Option<Device>,

    /// Image backbone name.
    #[arg(long, global = true)]
    backbone: Option<String>,

    /// Directory for loss curves and epoch history.
    #[arg(long, global = true)]
    report_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Train the recurrent branch on the sensor histories.
    PretrainRecurrent,

    /// Train the image branch head over a frozen backbone.
    TrainImage,

    /// Train the fusion head over both branch embeddings.
    TrainHybrid {
        /// Backpropagate into the recurrent branch as well.
        #[arg(long)]
        fine_tune: bool,

        /// Recurrent branch weights to start from instead of pretraining.
        #[arg(long)]
        recurrent_weights: Option<PathBuf>,
    },

    /// Write the effective configuration to a JSON file.
    WriteConfig {
        #[arg(long, default_value = "run_config.json")]
        output: PathBuf,
    },
}

impl Overrides {
    fn apply(&self, config: &mut RunConfig) {
        for stage in [&mut config.pretrain, &mut config.image_train, &mut config.hybrid_train] {
            self.apply_stage(stage);
        }
        if let Some(backbone) = &self.backbone {
            config.backbone = backbone.clone();
        }
        if let Some(dir) = &self.report_dir {
            config.outputs.report_dir = Some(dir.clone());
        }
    }

    fn apply_stage(&self, stage: &mut TrainConfig) {
        if let Some(epochs) = self.epochs {
            stage.epochs = epochs;
        }
        if let Some(batch_size) = self.batch_size {
            stage.batch_size = batch_size;
        }
        if let Some(lr) = self.lr {
            stage.learning_rate = lr;
        }
        if let Some(patience) = self.patience {
            stage.patience = patience;
        }
        if let Some(device) = self.device {
            stage.device = device;
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => RunConfig::load_json(path)?,
        None => RunConfig::default(),
    };
    cli.overrides.apply(&mut config);

    match cli.command {
        Command::PretrainRecurrent => {
            let outcome = pipeline::pretrain_recurrent(&config)?;
            println!(
                "recurrent branch: best epoch {}, accuracy {:.2}%, MAE {:.3}, RMSE {:.3}",
                outcome.best_epoch, outcome.test.accuracy, outcome.test.mae, outcome.test.rmse
            );
        }
        Command::TrainImage => {
            let outcome = pipeline::train_image_branch(&config)?;
            println!(
                "image branch ({}): best epoch {}, accuracy {:.2}%, MAE {:.3}, RMSE {:.3}",
                config.backbone, outcome.best_epoch, outcome.test.accuracy, outcome.test.mae, outcome.test.rmse
            );
        }
        Command::TrainHybrid { fine_tune, recurrent_weights } => {
            config.fine_tune_recurrent |= fine_tune;
            if recurrent_weights.is_some() {
                config.pretrained_recurrent = recurrent_weights;
            }
            let outcome = pipeline::train_hybrid(&config)?;
            let test = outcome.test();
            println!(
                "hybrid model: best epoch {}, accuracy {:.2}%, MAE {:.3}, RMSE {:.3}",
                outcome.best_epoch(), test.accuracy, test.mae, test.rmse
            );
        }
        Command::WriteConfig { output } => {
            config.validate()?;
            config.save_json(&output)?;
            println!("configuration written to {}", output.display());
        }
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
