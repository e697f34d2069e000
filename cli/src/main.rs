//! paperfmt CLI - manuscript reformatting tool

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use paperfmt::{
    detect_format_from_path, JsonFormat, JobStatus, Orchestrator, OrchestratorConfig, Package,
    Paperfmt, Stage, Template, TemplateRegistry,
};

#[derive(Parser)]
#[command(name = "paperfmt")]
#[command(version)]
#[command(about = "Reformat DOCX manuscripts to publication templates", long_about = None)]
struct Cli {
    /// Input DOCX file
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Template name
    #[arg(short, long, default_value = "ieee", env = "PAPERFMT_TEMPLATE")]
    template: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Reformat a manuscript with a template
    #[command(alias = "fmt")]
    Format {
        /// Input DOCX file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Template name (ieee, apa, mla, chicago)
        #[arg(short, long, default_value = "ieee", env = "PAPERFMT_TEMPLATE")]
        template: String,

        /// Additional template definition (JSON)
        #[arg(long, value_name = "JSON")]
        template_file: Option<PathBuf>,

        /// Output file (formatted_{template}_{name}.docx if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Per-stage time limit in seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
    },

    /// Show how a manuscript was classified, as JSON
    Analyze {
        /// Input DOCX file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output compact JSON
        #[arg(long)]
        compact: bool,
    },

    /// List available templates
    Templates {
        /// Print the full definition of one template
        #[arg(value_name = "NAME")]
        name: Option<String>,
    },

    /// Show document information
    Info {
        /// Input DOCX file
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Show version information
    Version,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Format {
            input,
            template,
            template_file,
            output,
            timeout,
        }) => cmd_format(
            &input,
            &template,
            template_file.as_deref(),
            output.as_deref(),
            timeout,
        ),
        Some(Commands::Analyze {
            input,
            output,
            compact,
        }) => cmd_analyze(&input, output.as_deref(), compact),
        Some(Commands::Templates { name }) => cmd_templates(name.as_deref()),
        Some(Commands::Info { input }) => cmd_info(&input),
        Some(Commands::Version) => {
            cmd_version();
            Ok(())
        }
        None => {
            // Default behavior: format if input is provided
            if let Some(input) = cli.input {
                cmd_format(&input, &cli.template, None, None, None)
            } else {
                println!("{}", "Usage: paperfmt <FILE> [--template NAME]".yellow());
                println!("       paperfmt --help for more information");
                Ok(())
            }
        }
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn stage_message(status: &JobStatus) -> String {
    match status.stage {
        Stage::Uploaded => "Reading package...".to_string(),
        Stage::Built => "Classifying sections...".to_string(),
        Stage::Classified => "Analysis complete".to_string(),
        Stage::Templated => format!(
            "Applying template '{}'...",
            status.template.as_deref().unwrap_or("?")
        ),
        Stage::Rendered => "Rendered".to_string(),
        Stage::Fetched => "Done!".to_string(),
        Stage::Failed => "Failed".to_string(),
    }
}

fn load_templates(template_file: Option<&Path>) -> Result<TemplateRegistry, Box<dyn std::error::Error>> {
    let mut templates = TemplateRegistry::with_builtins()?;
    if let Some(path) = template_file {
        let template = Template::from_json(&fs::read_to_string(path)?)?;
        log::info!("registering template '{}' from {}", template.name, path.display());
        templates.register(template)?;
    }
    Ok(templates)
}

fn cmd_format(
    input: &Path,
    template: &str,
    template_file: Option<&Path>,
    output: Option<&Path>,
    timeout: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = OrchestratorConfig::new();
    if let Some(secs) = timeout {
        config = config.with_stage_timeout(Duration::from_secs(secs));
    }
    let orchestrator = Orchestrator::with_templates(config, load_templates(template_file)?);

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(80));

    let name = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "document".to_string());

    orchestrator.accept_with_id(name.clone(), fs::read(input)?)?;
    pb.set_message(stage_message(&orchestrator.status(&name)?));

    let stages = || -> paperfmt::Result<JobStatus> {
        pb.set_message(stage_message(&orchestrator.process(&name)?));
        pb.set_message(stage_message(&orchestrator.select_template(&name, template)?));
        let status = orchestrator.render(&name)?;
        pb.set_message(stage_message(&status));
        Ok(status)
    };
    let status = match stages() {
        Ok(status) => status,
        Err(e) => {
            pb.abandon_with_message("Failed");
            return Err(e.into());
        }
    };

    let download = orchestrator.download(&name, template)?;
    let path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| input.with_file_name(&download.file_name));
    fs::write(&path, &download.bytes[..])?;
    pb.finish_with_message(stage_message(&orchestrator.status(&name)?));

    for warning in &status.warnings {
        println!("{} {}", "warning:".yellow().bold(), warning);
    }
    println!("{} {}", "Saved to".green(), path.display());

    Ok(())
}

fn cmd_analyze(
    input: &Path,
    output: Option<&Path>,
    compact: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let orchestrator = Orchestrator::new(OrchestratorConfig::new())?;
    let id = orchestrator.ingest(fs::read(input)?)?;
    let analysis = orchestrator.analyze(&id)?;

    let format = if compact {
        JsonFormat::Compact
    } else {
        JsonFormat::Pretty
    };
    let json = paperfmt::render::to_json(&analysis, format)?;

    if let Some(path) = output {
        fs::write(path, &json)?;
        println!("{} {}", "Saved to".green(), path.display());
    } else {
        println!("{}", json);
    }

    Ok(())
}

fn cmd_templates(name: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let templates = TemplateRegistry::builtins()?;

    if let Some(name) = name {
        let template = templates.resolve(name)?;
        println!("{}", serde_json::to_string_pretty(template.as_ref())?);
        return Ok(());
    }

    println!("{}", "Available Templates".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    for template in templates.iter() {
        println!(
            "{:<10} {} {}",
            template.name.bold(),
            template.display_name,
            format!("- {}", template.description).dimmed()
        );
    }
    Ok(())
}

fn cmd_info(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let format = detect_format_from_path(input)?;
    let package = Package::open(&fs::read(input)?)?;
    let manuscript = Paperfmt::new().open(input)?;
    let doc = manuscript.document();

    println!("{}", "Document Information".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    println!("{}: {}", "File".bold(), input.display());
    println!("{}: {}", "Format".bold(), format);
    println!("{}: {}", "Parts".bold(), package.len());
    println!("{}: {}", "Main part".bold(), package.main_document_name());

    if let Some(ref title) = doc.metadata.title {
        println!("{}: {}", "Title".bold(), title);
    }
    if let Some(ref author) = doc.metadata.author {
        println!("{}: {}", "Author".bold(), author);
    }
    if let Some(ref created) = doc.metadata.created {
        println!("{}: {}", "Created".bold(), created);
    }
    if let Some(ref modified) = doc.metadata.modified {
        println!("{}: {}", "Modified".bold(), modified);
    }

    println!();
    println!("{}", "Content Statistics".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    let text = doc.plain_text();
    println!("{}: {}", "Words".bold(), text.split_whitespace().count());
    println!("{}: {}", "Blocks".bold(), doc.block_count());
    for (label, count) in manuscript.classified.label_counts() {
        println!("  {} {}: {}", "├─".dimmed(), label, count);
    }
    println!("{}: {}", "Sections".bold(), manuscript.classified.sections.len());
    println!("{}: {}", "Citations".bold(), manuscript.classified.citations.len());
    println!("{}: {}", "References".bold(), manuscript.references.len());

    for ambiguity in &manuscript.classified.ambiguities {
        println!("{} {}", "note:".yellow(), ambiguity);
    }

    Ok(())
}

fn cmd_version() {
    println!("{} {}", "paperfmt".cyan().bold(), env!("CARGO_PKG_VERSION"));
    println!("Manuscript reformatting tool");
    println!();
    println!("License: MIT");
}
