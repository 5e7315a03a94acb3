use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use clap_complete::{generate, Shell};
use clap_complete_nushell::Nushell;
use clap_mangen::Man;
use r2lab_monitor::cli::Args;

use std::io::Write;
use std::{
    env, fs,
    path::{Path, PathBuf},
    process::Command,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct XtaskArgs {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Generate man page and shell completions.
    GenerateDocs,
    /// Run cargo check.
    Check,
    /// Run cargo test.
    Test,
    /// Run cargo clippy.
    Clippy,
    /// Run cargo fmt --check.
    FmtCheck,
}

fn main() -> Result<()> {
    let args = XtaskArgs::parse();

    match args.command {
        Commands::GenerateDocs => generate_docs().context("Failed to generate docs"),
        Commands::Check => run_cargo("check", &[]).context("cargo check failed"),
        Commands::Test => run_cargo("test", &[]).context("cargo test failed"),
        Commands::Clippy => run_cargo("clippy", &["--", "-D", "warnings"]).context("cargo clippy failed"),
        Commands::FmtCheck => run_cargo("fmt", &["--", "--check"]).context("cargo fmt failed"),
    }
}

fn run_cargo(command: &str, args: &[&str]) -> Result<()> {
    let cargo = env::var("CARGO").unwrap_or_else(|_| "cargo".to_string());
    let mut cmd = Command::new(cargo);
    cmd.arg(command);
    cmd.args(args);
    cmd.current_dir(project_root());

    let status = cmd.status().context(format!("Failed to execute cargo {command}"))?;
    if !status.success() {
        anyhow::bail!("cargo {command} command failed");
    }
    Ok(())
}

fn project_root() -> PathBuf {
    Path::new(&env!("CARGO_MANIFEST_DIR")).ancestors().nth(1).unwrap().to_path_buf()
}

fn generate_docs() -> Result<()> {
    let root_dir = project_root();
    let docs_dir = root_dir.join("docs");
    let man_dir = docs_dir.join("man");
    let completions_dir = docs_dir.join("completions");

    fs::create_dir_all(&man_dir).context("Failed to create man directory")?;
    fs::create_dir_all(&completions_dir).context("Failed to create completions directory")?;

    let cmd = Args::command();
    let bin_name = cmd.get_name().to_string();

    let man_path = man_dir.join(format!("{bin_name}.1"));
    println!("Generating man page: {man_path:?}");
    generate_man_page(&cmd, &man_path)?;

    generate_completions(&cmd, &completions_dir)?;

    println!("Successfully generated man page and completions in: {}", docs_dir.display());
    Ok(())
}

const MAN_STAGES: &str = r#"
\fB{bin_name}\fR probes each configured node through three stages, in order, every cycle:
.IP 1. 4
\fBCMC status\fR \(em HTTP GET against the node's chassis-management controller (\fIreboot<ID>\fR). A body of "on" continues to the next stage; anything else ends the node's cycle with \fIcmc_on_off\fR set to "off" or "fail".
.IP 2. 4
\fBShell probe\fR \(em a passwordless admin shell connection to \fIfit<ID>\fR retrieves the OS release and, unless \fB\-w\fR is given, wireless byte-rate counters. A refused connection falls through to stage 3; a completed session ends the node's cycle.
.IP 3. 4
\fBControl ping\fR \(em a single ICMP echo to \fIfit<ID>\fR. Always ends the node's cycle, whichever way it goes.
.PP
Results are streamed to the sidecar bus as a JSON batch immediately after each stage completes, not at the end of the cycle.
"#;

const MAN_SUMMARY: &str = r#"
At the end of each cycle a one-line mask is logged: one character per node, \fB.\fR for CMC off/fail, \fBo\fR for ping failure, \fB0\fR for shell refusal, \fBF\fR/\fBU\fR for a detected Fedora/Ubuntu release, \fB^\fR otherwise. With \fB\-m\fR, the mask is padded with \fB_\fR to show the probed nodes in the context of a wider id range.
"#;

const MAN_SIGNALS: &str = r#"
\fB{bin_name}\fR handles SIGHUP, SIGINT, SIGQUIT and SIGTERM by abandoning whatever stage is in flight, closing the sidecar connection, and exiting with status 1.
"#;

const MAN_EXIT_STATUS: &str = r#"
.IP 0 4
Normal exit after the configured number of cycles (\fB\-r\fR).
.IP 1 4
A termination signal was received, or the sidecar URL (\fB\-s\fR) could not be parsed.
"#;

const MAN_ENVIRONMENT: &str = r#"
.TP
.B RUST_LOG
Controls logging verbosity and filtering, overriding the default set by \fB\-v\fR. Uses the \fBtracing_subscriber::EnvFilter\fR format.
"#;

const MAN_SEE_ALSO: &str = r#"
\fBssh\fR(1), \fBping\fR(8)
"#;

/// Generates the man page with custom sections.
fn generate_man_page(cmd: &clap::Command, path: &Path) -> Result<()> {
    let version = env!("CARGO_PKG_VERSION");
    let date = chrono::Local::now().format("%B %d, %Y").to_string();
    let app_name_uppercase = cmd.get_name().to_uppercase();
    let bin_name = cmd.get_name();

    let mut buffer: Vec<u8> = Vec::new();

    writeln!(buffer, r#".TH "{app_name_uppercase}" 1 "{date}" "{version}" "User Commands""#)?;
    Man::new(cmd.clone()).render(&mut buffer)?;

    let custom_sections = [
        ("STAGES", MAN_STAGES),
        ("SUMMARY LINE", MAN_SUMMARY),
        ("SIGNALS", MAN_SIGNALS),
        ("EXIT STATUS", MAN_EXIT_STATUS),
        ("ENVIRONMENT", MAN_ENVIRONMENT),
        ("SEE ALSO", MAN_SEE_ALSO),
    ];

    for (title, content_template) in custom_sections {
        writeln!(buffer, ".SH {title}")?;
        let formatted_content = content_template.replace("{bin_name}", bin_name);
        writeln!(buffer, "{formatted_content}")?;
    }

    fs::write(path, buffer).with_context(|| format!("Failed to write man page to {path:?}"))?;
    Ok(())
}

/// Generates shell completion files.
fn generate_completions(cmd: &clap::Command, completions_dir: &Path) -> Result<()> {
    let bin_name = cmd.get_name();
    let shells = [Shell::Bash, Shell::Elvish, Shell::Fish, Shell::PowerShell, Shell::Zsh];

    for shell in shells {
        let ext = match shell {
            Shell::Bash => "bash",
            Shell::Elvish => "elv",
            Shell::Fish => "fish",
            Shell::PowerShell => "ps1",
            Shell::Zsh => "zsh",
            _ => continue,
        };
        let completions_path = completions_dir.join(format!("{bin_name}.{ext}"));
        println!("Generating completion file: {completions_path:?}");
        let mut file = fs::File::create(&completions_path)
            .with_context(|| format!("Failed to create completion file: {completions_path:?}"))?;
        generate(shell, &mut cmd.clone(), bin_name, &mut file);
    }

    let nu_path = completions_dir.join(format!("{bin_name}.nu"));
    println!("Generating Nushell completion file: {nu_path:?}");
    let mut nu_file = fs::File::create(&nu_path)
        .with_context(|| format!("Failed to create Nushell completion file: {nu_path:?}"))?;
    generate(Nushell, &mut cmd.clone(), bin_name, &mut nu_file);

    Ok(())
}
