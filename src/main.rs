use anthology::compile::{self, CompileError, Deliverable, ExternalCompiler};
use anthology::config::{self, AnthologyConfig};
use anthology::load::{self, Loaded};
use anthology::output;
use anthology::render::{self, TemplateSource};
use anthology::session::{Session, SessionError};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Image attachments given on the command line.
#[derive(clap::Args, Clone)]
struct AttachArgs {
    /// Attach an image to a poem, in addition to those in config.toml
    #[arg(long = "attach", value_name = "POEM=PATH", value_parser = parse_attachment)]
    attach: Vec<(String, PathBuf)>,
}

fn parse_attachment(arg: &str) -> Result<(String, PathBuf), String> {
    match arg.split_once('=') {
        Some((poem, path)) if !poem.is_empty() && !path.is_empty() => {
            Ok((poem.to_string(), PathBuf::from(path)))
        }
        _ => Err(format!("expected POEM=PATH, got '{arg}'")),
    }
}

fn version_string() -> &'static str {
    let on_tag = env!("ANTHOLOGY_ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("ANTHOLOGY_GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "anthology")]
#[command(about = "Typeset a directory of poems into a PDF anthology")]
#[command(long_about = "\
Typeset a directory of poems into a PDF anthology

Every .txt file in the poems directory becomes a chapter, titled after its
file name. Images are attached per poem in config.toml or with --attach.

Poems directory:

  poems/
  ├── config.toml                  # Optional settings (see gen-config)
  ├── dawn.txt                     # Poem 'dawn'
  ├── the-road.txt                 # Poem 'the-road'
  ├── README.txt                   # Excluded by default
  ├── images/
  │   └── sunrise.png              # Attached via [attachments] dawn = [...]
  └── templates/
      └── anthology_template.tex   # Custom template (see init-template)

LaTeX special characters in poems are escaped, so text is typeset as written.
Building requires pdflatex (or the program set in [compiler]) on PATH.

Run 'anthology gen-config' to generate a documented config.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Directory containing the poem .txt files
    #[arg(long, default_value = ".", global = true)]
    poems: PathBuf,

    /// Output directory for anthology.pdf and anthology.tex
    #[arg(long, default_value = "anthology-out", global = true)]
    output: PathBuf,

    /// Config file [default: <poems>/config.toml]
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Show debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load the poems and list what would be typeset
    Check {
        /// Print the inventory as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write the LaTeX source and staged images without compiling
    Render(AttachArgs),
    /// Run the full pipeline: load → stage → render → compile
    Build(AttachArgs),
    /// Print a stock config.toml with all options documented
    GenConfig,
    /// Write the built-in template to <poems>/templates/ for customizing
    InitTemplate {
        /// Overwrite an existing template
        #[arg(long)]
        force: bool,
    },
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| cli.poems.join(config::CONFIG_FILENAME));

    match cli.command {
        Command::Check { json } => {
            let config = config::load_config(&config_path)?;
            let loaded = load::load_poems(&cli.poems, &config.exclude)?;
            report_skipped_poems(&loaded);
            let anthology = loaded.into_anthology();
            if json {
                println!("{}", serde_json::to_string_pretty(&anthology)?);
            } else if anthology.is_empty() {
                tracing::warn!(dir = %cli.poems.display(), "no poems found");
                println!("{}", output::format_no_poems(&cli.poems));
            } else {
                println!("==> Checking {}", cli.poems.display());
                output::print_load_output(&anthology);
                println!("==> {}", output::format_check_summary(&anthology));
            }
        }
        Command::Render(attach) => {
            let Some(prepared) = prepare(&cli.poems, &config_path, &attach.attach)? else {
                return Ok(());
            };
            println!("==> Rendering → {}", cli.output.display());
            let source = prepared
                .session
                .render(&prepared.template, &prepared.config.document)?;
            let tex = Deliverable {
                file_name: compile::SOURCE_FILENAME,
                content_type: "text/plain",
                bytes: source.into_bytes(),
            };
            let tex_path = tex.write_to(&cli.output)?;
            prepared.session.export_staged_images(&cli.output)?;
            for line in output::format_written(&[(&tex, tex_path.as_path())]) {
                println!("{}", line);
            }
            prepared.session.close()?;
        }
        Command::Build(attach) => {
            let Some(prepared) = prepare(&cli.poems, &config_path, &attach.attach)? else {
                return Ok(());
            };
            let Prepared {
                session,
                config,
                template,
            } = prepared;
            let compiler = ExternalCompiler::from_config(&config.compiler);

            println!(
                "==> Compiling with {} ({} passes)",
                config.compiler.program,
                compile::COMPILE_PASSES
            );
            let compiled = match session.generate(&template, &config.document, &compiler) {
                Ok(compiled) => compiled,
                Err(err) => {
                    if let SessionError::Compile(CompileError::Failed {
                        pass,
                        status,
                        stdout,
                        stderr,
                    }) = &err
                    {
                        for line in output::format_compile_failure(*pass, status, stdout, stderr) {
                            eprintln!("{}", line);
                        }
                    }
                    if let SessionError::Compile(_) = &err {
                        keep_failed_source(&session, &cli.output);
                    }
                    if let Err(close_err) = session.close() {
                        tracing::warn!(error = %close_err, "could not remove work dir");
                    }
                    return Err(err.into());
                }
            };

            let mut written = Vec::new();
            for deliverable in compiled.deliverables() {
                written.push((deliverable, deliverable.write_to(&cli.output)?));
            }
            let lines = output::format_written(
                &written
                    .iter()
                    .map(|(d, p)| (*d, p.as_path()))
                    .collect::<Vec<_>>(),
            );
            for line in lines {
                println!("{}", line);
            }
            session.close()?;
            println!("==> Build complete: {}", cli.output.display());
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
        Command::InitTemplate { force } => {
            let dir = cli.poems.join("templates");
            let path = dir.join(render::TEMPLATE_NAME);
            if path.exists() && !force {
                return Err(format!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                )
                .into());
            }
            fs::create_dir_all(&dir)?;
            fs::write(&path, render::STOCK_TEMPLATE)?;
            println!("Wrote {}", path.display());
            println!("Set `template_dir = \"templates\"` under [document] in config.toml to use it.");
        }
    }

    Ok(())
}

/// Log to stderr so stdout stays clean for `check --json` and `gen-config`.
///
/// `RUST_LOG` takes precedence unless `--verbose` is given.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("anthology=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("anthology=warn"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// State shared by `render` and `build` once poems are loaded and staged.
struct Prepared {
    session: Session,
    config: AnthologyConfig,
    template: TemplateSource,
}

/// Load config and poems, open a session, and stage every attachment.
///
/// Returns `None` when there are no poems. Attachments that fail to stage
/// are reported and skipped.
fn prepare(
    poems: &Path,
    config_path: &Path,
    extra: &[(String, PathBuf)],
) -> CliResult<Option<Prepared>> {
    let config = config::load_config(config_path)?;
    let base_dir = config_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    println!("==> Loading poems from {}", poems.display());
    let loaded = load::load_poems(poems, &config.exclude)?;
    report_skipped_poems(&loaded);
    let anthology = loaded.into_anthology();
    if anthology.is_empty() {
        tracing::warn!(dir = %poems.display(), "no poems found");
        println!("{}", output::format_no_poems(poems));
        return Ok(None);
    }

    let mut session = Session::new(anthology)?;
    let base = base_dir.as_path();
    let configured = config.attachments.iter().flat_map(|(poem, paths)| {
        paths
            .iter()
            .map(move |p| (poem.clone(), config::resolve_path(base, p)))
    });
    for (poem, path, err) in session.attach_all(configured.chain(extra.iter().cloned())) {
        println!(
            "{}",
            output::format_skipped_attachment(&poem, &path, &err.to_string())
        );
    }
    output::print_load_output(session.anthology());

    let template = TemplateSource::from_config(&config.document, &base_dir);
    Ok(Some(Prepared {
        session,
        config,
        template,
    }))
}

/// Print every poem file the loader could not read.
fn report_skipped_poems(loaded: &Loaded) {
    for err in loaded.skipped() {
        println!("{}", output::format_skipped_poem(&err.to_string()));
    }
}

/// Copy the source that failed to compile into the output directory.
///
/// Best effort: the compile error is what gets returned either way.
fn keep_failed_source(session: &Session, output: &Path) {
    match session.keep_source(output) {
        Ok(Some(kept)) => eprintln!("Source kept at {}", kept.display()),
        Ok(None) => {}
        Err(err) => tracing::warn!(error = %err, "could not keep failed source"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anthology::stage::STAGING_DIR;

    #[test]
    fn parse_attachment_splits_on_first_equals() {
        assert_eq!(
            parse_attachment("dawn=images/sun.png").unwrap(),
            ("dawn".to_string(), PathBuf::from("images/sun.png"))
        );
        assert_eq!(
            parse_attachment("dawn=odd=name.png").unwrap(),
            ("dawn".to_string(), PathBuf::from("odd=name.png"))
        );
    }

    #[test]
    fn parse_attachment_keeps_spaces_in_path() {
        let (poem, path) = parse_attachment("the-road=old map #2.jpg").unwrap();
        assert_eq!(poem, "the-road");
        assert_eq!(path, PathBuf::from("old map #2.jpg"));
    }

    #[test]
    fn parse_attachment_rejects_malformed() {
        for arg in ["dawn", "=x.png", "dawn=", ""] {
            let err = parse_attachment(arg).unwrap_err();
            assert!(err.contains("POEM=PATH"), "{arg:?}: {err}");
        }
    }

    #[test]
    fn attach_flags_collect_in_order() {
        let cli = Cli::try_parse_from([
            "anthology",
            "render",
            "--attach",
            "dawn=a.png",
            "--attach",
            "dusk=b.jpg",
        ])
        .unwrap();
        match cli.command {
            Command::Render(args) => assert_eq!(
                args.attach,
                vec![
                    ("dawn".to_string(), PathBuf::from("a.png")),
                    ("dusk".to_string(), PathBuf::from("b.jpg")),
                ]
            ),
            _ => panic!("expected render"),
        }
    }

    #[test]
    fn global_flags_default() {
        let cli = Cli::try_parse_from(["anthology", "check"]).unwrap();
        assert_eq!(cli.poems, PathBuf::from("."));
        assert_eq!(cli.output, PathBuf::from("anthology-out"));
        assert!(cli.config.is_none());
        assert!(!cli.verbose);
    }

    #[test]
    fn prepare_stages_config_and_flag_attachments() {
        let poems = tempfile::TempDir::new().unwrap();
        fs::write(poems.path().join("dawn.txt"), "first light").unwrap();
        fs::write(poems.path().join("a.png"), b"a").unwrap();
        fs::write(poems.path().join("b.gif"), b"b").unwrap();
        fs::write(poems.path().join("c.jpg"), b"c").unwrap();
        let config_path = poems.path().join(config::CONFIG_FILENAME);
        fs::write(&config_path, "[attachments]\ndawn = [\"a.png\", \"b.gif\"]\n").unwrap();
        let extra = vec![("dawn".to_string(), poems.path().join("c.jpg"))];

        let prepared = prepare(poems.path(), &config_path, &extra)
            .unwrap()
            .unwrap();

        let dawn = prepared.session.anthology().get("dawn").unwrap();
        let names: Vec<&str> = dawn.images.iter().map(|i| i.source_name.as_str()).collect();
        assert_eq!(names, vec!["a.png", "c.jpg"]);

        let out = tempfile::TempDir::new().unwrap();
        prepared.session.export_staged_images(out.path()).unwrap();
        assert!(out.path().join(STAGING_DIR).join("dawn_a.png").is_file());
        assert!(out.path().join(STAGING_DIR).join("dawn_c.jpg").is_file());
    }

    #[test]
    fn prepare_without_poems_is_none() {
        let poems = tempfile::TempDir::new().unwrap();
        let config_path = poems.path().join(config::CONFIG_FILENAME);

        assert!(prepare(poems.path(), &config_path, &[]).unwrap().is_none());
    }
}
