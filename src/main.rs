//! # badgeforge CLI
//!
//! Command-line interface for rendering badges and exporting print sheets.
//!
//! ## Usage
//!
//! ```bash
//! # Render one badge to PNG
//! badgeforge render --template template.json --data people.json --row 0 --output badge.png
//!
//! # Export every row to a PDF
//! badgeforge export --template template.json --data people.json --output badges.pdf
//!
//! # Show the page grid for a template
//! badgeforge layout --template template.json --count 120
//!
//! # Start the editor API
//! badgeforge serve --listen 127.0.0.1:5000 --work-dir /tmp/badges
//! ```
//!
//! Fonts: `--font DIR` (repeatable) registers every `.ttf`/`.otf` in `DIR`.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use badgeforge::{
    BadgeError, CellLayout, Rows, Template,
    export::{ExportStatus, PdfSink, export},
    render::{FontBook, encode_png, load_background, render_badge},
    server::{ServerConfig, serve},
};

/// badgeforge - Batch badge renderer
#[derive(Parser, Debug)]
#[command(name = "badgeforge")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory of .ttf/.otf fonts to register (repeatable)
    #[arg(long = "font", value_name = "DIR", global = true)]
    fonts: Vec<PathBuf>,

    /// Font file used when a field's family is not registered
    #[arg(long, value_name = "FILE", global = true)]
    default_font: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render one row to a PNG
    Render {
        /// Template JSON file
        #[arg(long)]
        template: PathBuf,

        /// Row data JSON file
        #[arg(long)]
        data: PathBuf,

        /// Row index (0-based)
        #[arg(long, default_value = "0")]
        row: usize,

        /// Output PNG file
        #[arg(long, value_name = "FILE")]
        output: PathBuf,

        /// Background image (overrides the template's)
        #[arg(long)]
        background: Option<PathBuf>,
    },

    /// Export every row to a PDF sheet
    Export {
        /// Template JSON file
        #[arg(long)]
        template: PathBuf,

        /// Row data JSON file
        #[arg(long)]
        data: PathBuf,

        /// Output PDF file
        #[arg(long, value_name = "FILE")]
        output: PathBuf,

        /// Background image (overrides the template's)
        #[arg(long)]
        background: Option<PathBuf>,
    },

    /// Print the page grid for a template
    Layout {
        /// Template JSON file
        #[arg(long)]
        template: PathBuf,

        /// Number of badges to paginate
        #[arg(long, default_value = "0")]
        count: usize,
    },

    /// Start the HTTP editor API
    Serve {
        /// Address to listen on
        #[arg(long, env = "BADGEFORGE_LISTEN", default_value = "127.0.0.1:5000")]
        listen: String,

        /// Directory for exported PDFs
        #[arg(long, env = "BADGEFORGE_WORK_DIR")]
        work_dir: Option<PathBuf>,

        /// Maximum upload size in megabytes
        #[arg(long, default_value = "16")]
        upload_limit_mb: usize,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("badgeforge=info,tower_http=info")),
        )
        .init();

    if let Err(e) = run() {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn load_fonts(dirs: &[PathBuf], default_font: Option<&Path>) -> Result<FontBook, BadgeError> {
    let mut fonts = FontBook::with_system_default();
    for dir in dirs {
        let loaded = fonts.register_dir(dir)?;
        info!(dir = %dir.display(), loaded, "Registered fonts");
    }
    if let Some(path) = default_font {
        fonts.set_default(std::fs::read(path)?)?;
        info!(path = %path.display(), "Using default font");
    }
    if !fonts.has_default() {
        warn!("No default font found; unregistered families use the built-in bitmap font");
    }
    Ok(fonts)
}

fn load_inputs(template: &Path, data: &Path) -> Result<(Template, Rows), BadgeError> {
    let template = Template::load(template)?;
    template.validate()?;
    let rows = Rows::load(data)?;
    Ok((template, rows))
}

fn run() -> Result<(), BadgeError> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Render {
            template,
            data,
            row,
            output,
            background,
        } => {
            let (template, rows) = load_inputs(&template, &data)?;
            if rows.get(row).is_none() {
                return Err(BadgeError::Data(format!(
                    "Row {} out of range ({} rows)",
                    row,
                    rows.rows.len()
                )));
            }
            let fonts = load_fonts(&cli.fonts, cli.default_font.as_deref())?;
            let background = background.and_then(|p| load_background(&p, template.width, template.height));

            let badge = render_badge(&template, &rows, row, background.as_ref(), &fonts);
            std::fs::write(&output, encode_png(&badge)?)?;
            info!(output = %output.display(), row, "Rendered badge");
        }

        Commands::Export {
            template,
            data,
            output,
            background,
        } => {
            let (template, rows) = load_inputs(&template, &data)?;
            let fonts = load_fonts(&cli.fonts, cli.default_font.as_deref())?;
            let background = background.and_then(|p| load_background(&p, template.width, template.height));

            let (page_width, page_height) = template.page_size.dimensions_pt();
            let mut sink = PdfSink::create(&output, page_width, page_height)?;
            let total = rows.rows.len();
            let report = export(
                &template,
                &rows,
                &mut sink,
                background.as_ref(),
                &fonts,
                |n| info!(progress = n, total, "Exported badge"),
                || false,
            );
            if report.status != ExportStatus::Done {
                return Err(BadgeError::Pdf(
                    report.error.unwrap_or_else(|| format!("Export ended as {:?}", report.status)),
                ));
            }
            let pages = CellLayout::compute(&template).page_count(report.processed).max(1);
            println!("Wrote {} badges on {} pages to {}", report.processed, pages, output.display());
        }

        Commands::Layout { template, count } => {
            let template = Template::load(&template)?;
            template.validate()?;
            let layout = CellLayout::compute(&template);
            println!("{}", serde_json::to_string_pretty(&layout)?);
            println!(
                "{} per page, {} badges -> {} pages",
                layout.badges_per_page(),
                count,
                layout.page_count(count)
            );
        }

        Commands::Serve {
            listen,
            work_dir,
            upload_limit_mb,
        } => {
            let fonts = load_fonts(&cli.fonts, cli.default_font.as_deref())?;
            let defaults = ServerConfig::default();
            let config = ServerConfig {
                listen_addr: listen,
                work_dir: work_dir.unwrap_or(defaults.work_dir),
                upload_limit: upload_limit_mb * 1024 * 1024,
            };
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(serve(config, fonts))?;
        }
    }

    Ok(())
}
