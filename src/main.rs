use alt_scout::analyze::CleanupAnalyzer;
use alt_scout::caption::{CaptionSettings, OllamaClient, ScratchDir};
use alt_scout::config::{self, ToolConfig};
use alt_scout::imaging::RustBackend;
use alt_scout::resolve::Resolver;
use alt_scout::session::{self, AltTextOptions, Mode, RunError, Services};
use alt_scout::types::LanguageChoice;
use alt_scout::{discover, output, signals};
use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "alt-scout")]
#[command(about = "Find orphaned images and backfill missing alt text")]
#[command(long_about = "\
Find orphaned images and backfill missing alt text

Image references are recognized in four forms, one line at a time:

  ![caption](./files/photo.jpg \"Title\")               markdown
  <img src=\"./files/photo.jpg\" alt=\"caption\">          markup
  <enhanced:img src={imageModules['./photo.jpg']} />  enhanced markup
  { src: imageModules['./photo.jpg'], alt: \"caption\" } grid entry

Commands:

  cleanup     Report images in referenced folders that nothing uses
  alt-text    Generate missing captions with a local vision model
  gen-config  Print a documented alt-scout.toml

Nothing is ever deleted. alt-text is a dry run unless --apply is given.")]
#[command(version)]
struct Cli {
    /// Config file (missing file means stock defaults)
    #[arg(long, default_value = config::CONFIG_FILENAME, global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Report unused images next to the content matching a path or glob
    Cleanup {
        /// Content file, directory, or pattern such as 'src/content/**/*.md'
        pattern: String,
        /// Only print totals, not the list of removable files
        #[arg(long)]
        dry_run: bool,
    },
    /// Generate alt text for images that have none
    AltText {
        /// Caption everything without asking
        #[arg(long)]
        batch: bool,
        /// Write accepted captions back to the content files
        #[arg(long)]
        apply: bool,
        /// Caption language: en, fr, or auto (from front matter)
        #[arg(long, default_value = "auto")]
        lang: LanguageChoice,
        /// Vision model name (overrides inference.model)
        #[arg(long)]
        model: Option<String>,
        /// Content directory to scan (repeatable; overrides content.dirs)
        #[arg(long = "dir")]
        dirs: Vec<PathBuf>,
        /// Also regenerate captions that are already filled in
        #[arg(long)]
        replace_existing: bool,
        /// List what would be captioned, without contacting the model
        #[arg(long)]
        check_only: bool,
    },
    /// Print a stock alt-scout.toml with all options documented
    GenConfig,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        }
    };

    match execute(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn execute(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cwd = std::env::current_dir()?;

    match cli.command {
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
            Ok(ExitCode::SUCCESS)
        }
        Command::Cleanup { pattern, dry_run } => {
            let config = config::load_config(&cli.config)?;
            cleanup(&config, &pattern, dry_run, &cwd)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::AltText {
            batch,
            apply,
            lang,
            model,
            dirs,
            replace_existing,
            check_only,
        } => {
            let mut config = config::load_config(&cli.config)?;
            if let Some(model) = model {
                config.inference.model = model;
            }
            let dirs = if dirs.is_empty() {
                config.content.dirs.iter().map(PathBuf::from).collect()
            } else {
                dirs
            };
            let options = AltTextOptions {
                mode: if batch { Mode::Batch } else { Mode::Interactive },
                apply,
                language: lang,
                dirs: dirs
                    .iter()
                    .map(|d| discover::absolute(d))
                    .collect::<Result<_, _>>()?,
                content_extensions: config.content.extensions.clone(),
                replace_existing,
                check_only,
            };
            alt_text(&config, &options, &cwd)
        }
    }
}

fn cleanup(
    config: &ToolConfig,
    pattern: &str,
    dry_run: bool,
    base: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let files = discover::expand_pattern(pattern, &config.content.extensions)?;
    if files.is_empty() {
        println!("No content files match {}", pattern);
        return Ok(());
    }

    output::print_lines(output::format_cleanup_start(files.len()));
    let mut analyzer = CleanupAnalyzer::new(config);
    for file in &files {
        match analyzer.analyze_file(file) {
            Ok(summary) => output::print_lines(output::format_file_summary(&summary)),
            Err(e) => output::print_lines(output::format_unreadable_file(file, &e.to_string())),
        }
    }
    let report = analyzer.finish();
    output::print_lines(output::format_analysis_report(&report));
    output::print_lines(output::format_cleanup_summary(&report, dry_run, base));
    Ok(())
}

fn alt_text(
    config: &ToolConfig,
    options: &AltTextOptions,
    base: &Path,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let settings = CaptionSettings::from_config(config);
    output::print_run_header(options, &settings.model, base);

    let scratch = ScratchDir::create()?;
    signals::install(scratch.handle())?;

    let backend = RustBackend::new();
    let client = OllamaClient::new(
        &config.inference.endpoint,
        Duration::from_secs(config.inference.timeout_secs),
    );
    let resolver = Resolver::new(discover::absolute(Path::new(&config.content.static_root))?);
    let services = Services {
        backend: &backend,
        client: &client,
        scratch: &scratch,
        resolver: &resolver,
        settings: &settings,
    };

    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    let result = session::run(options, &services, &mut input, &mut |event| {
        output::print_caption_event(&event, base)
    });

    match result {
        Ok(_) => Ok(ExitCode::SUCCESS),
        Err(RunError::ModelUnavailable(e)) => {
            output::print_model_error(&e, &settings.model);
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e.into()),
    }
}
