use std::future::Future;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use matcher_client::backend::HttpBackend;
use matcher_client::config::Config;
use matcher_client::filter::{recency_badges, JobBoard, RecencyBadge};
use matcher_client::models::{FacetCount, Job, ResumeInput};
use matcher_client::reveal::{RevealProjector, RevealSettings};
use matcher_client::{AnalysisBackend, AnalysisSession, Channel, CoverLetterOutcome, SubmitOutcome};

#[derive(Debug, Parser)]
#[command(name = "matcher", version, about = "Match a résumé against open job postings")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List active jobs, optionally narrowed by facets
    Jobs(JobsArgs),
    /// Summarise a résumé, rank jobs against it, and optionally write a cover letter
    Analyze(AnalyzeArgs),
}

#[derive(Debug, Args)]
struct JobsArgs {
    /// Company facet (matches company or affiliate name); repeatable
    #[arg(long)]
    company: Vec<String>,
    /// Tag facet; repeatable
    #[arg(long)]
    tag: Vec<String>,
    /// Only jobs uploaded within the last day
    #[arg(long)]
    day: bool,
    /// Only jobs uploaded within the last week
    #[arg(long)]
    week: bool,
    /// Show full details for this job id
    #[arg(long)]
    expand: Option<String>,
}

#[derive(Debug, Args)]
struct AnalyzeArgs {
    /// Résumé PDF to upload
    #[arg(long, conflicts_with = "text", required_unless_present = "text")]
    pdf: Option<PathBuf>,
    /// Résumé as plain text
    #[arg(long)]
    text: Option<String>,
    /// Write a cover letter for the match at this 1-based rank
    #[arg(long, value_name = "RANK")]
    letter: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("matcher={0},matcher_client={0}", &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("matcher v{} against {}", env!("CARGO_PKG_VERSION"), config.api_url);

    let backend = HttpBackend::new(&config.api_url, config.request_timeout)?;
    match cli.command {
        Command::Jobs(args) => list_jobs(&backend, args).await,
        Command::Analyze(args) => analyze(&config, backend, args).await,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// matcher jobs
// ────────────────────────────────────────────────────────────────────────────

async fn list_jobs(backend: &HttpBackend, args: JobsArgs) -> Result<()> {
    let (jobs, tag_counts, company_counts) = tokio::try_join!(
        backend.fetch_active_jobs(),
        backend.fetch_tag_counts(),
        backend.fetch_company_counts(),
    )?;

    let mut board = JobBoard::new(jobs).with_facet_counts(tag_counts, company_counts);
    for company in &args.company {
        if !board.selection().is_company_selected(company) {
            board.toggle_company(company);
        }
    }
    for tag in &args.tag {
        if !board.selection().is_tag_selected(tag) {
            board.toggle_tag(tag);
        }
    }
    if args.day {
        board.toggle_recent_day();
    }
    if args.week {
        board.toggle_recent_week();
    }
    if let Some(id) = &args.expand {
        board.toggle_panel(id);
    }

    print_counts("Companies", board.company_counts());
    print_counts("Tags", board.tag_counts());

    let visible = board.visible();
    if board.selection().is_unrestricted() {
        println!("\n{} active jobs", board.jobs().len());
    } else {
        println!("\n{} of {} active jobs match the filters", visible.len(), board.jobs().len());
    }
    for job in visible {
        let badges: Vec<&str> = recency_badges(job, board.selection())
            .into_iter()
            .map(|badge| match badge {
                RecencyBadge::Day => "[today]",
                RecencyBadge::Week => "[this week]",
            })
            .collect();
        println!(
            "  {:>6}  {} ({}) {}",
            job.id,
            job.display_name(),
            job.tags.join(", "),
            badges.join(" ")
        );
        if board.expanded() == Some(job.id.as_str()) {
            print_details(job);
        }
    }
    Ok(())
}

fn print_counts(label: &str, counts: &[FacetCount]) {
    let line: Vec<String> = counts
        .iter()
        .map(|c| format!("{} ({})", c.name, c.job_count))
        .collect();
    println!("{label}: {}", line.join(", "));
}

fn print_details(job: &Job) {
    let sections = [
        ("Responsibilities", &job.responsibilities),
        ("Qualifications", &job.qualifications),
        ("Preferred", &job.preferred_qualifications),
        ("Hiring process", &job.hiring_process),
        ("Additional info", &job.additional_info),
    ];
    if let Some(date) = job.uploaded_on() {
        println!("          Uploaded: {}", date.format("%Y-%m-%d"));
    }
    if !job.team_info.is_empty() {
        println!("          Team: {}", job.team_info);
    }
    for (title, items) in sections {
        if items.is_empty() {
            continue;
        }
        println!("          {title}:");
        for item in items {
            println!("            - {item}");
        }
    }
    if !job.link.is_empty() {
        println!("          {}", job.link);
    }
}

// ────────────────────────────────────────────────────────────────────────────
// matcher analyze
// ────────────────────────────────────────────────────────────────────────────

async fn analyze(config: &Config, backend: HttpBackend, args: AnalyzeArgs) -> Result<()> {
    let resume = match (args.pdf, args.text) {
        (Some(path), _) => ResumeInput::from_pdf_path(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?,
        (None, Some(text)) => ResumeInput::Text(text),
        (None, None) => bail!("either --pdf or --text is required"),
    };

    let session = AnalysisSession::new(backend);
    let settings = RevealSettings::from(config);
    info!("Session {}", session.session_id());

    println!("Summary:");
    let outcome = reveal_while(&session, Channel::Summary, settings, session.submit(resume)).await??;
    if outcome == SubmitOutcome::Superseded {
        bail!("submission was superseded");
    }

    let matches = session.snapshot().matched_jobs;
    println!("\nMatches:");
    for (rank, job) in matches.iter().enumerate() {
        let score = job
            .cosine_similarity
            .map(|s| format!("{s:.2}"))
            .unwrap_or_else(|| "-".to_string());
        println!("  {:>2}. [{score}] {}", rank + 1, job.display_name());
        if let Some(reason) = &job.reason {
            println!("      {reason}");
        }
    }

    let Some(rank) = args.letter else {
        return Ok(());
    };
    let job = rank
        .checked_sub(1)
        .and_then(|i| matches.get(i))
        .with_context(|| format!("no match at rank {rank} ({} matches)", matches.len()))?;
    let selected = session.select_job(&job.id)?;

    println!("\nCover letter for {}:", selected.name);
    let outcome = reveal_while(
        &session,
        Channel::CoverLetter,
        settings,
        session.generate_cover_letter(),
    )
    .await??;
    if outcome != CoverLetterOutcome::Ready {
        warn!("Cover letter did not complete: {outcome:?}");
    }
    Ok(())
}

/// Prints `channel` through a reveal projector while `work` runs, then lets the
/// projection catch up with the final text. Fails only if stdout does.
async fn reveal_while<B, F, T>(
    session: &AnalysisSession<B>,
    channel: Channel,
    settings: RevealSettings,
    work: F,
) -> Result<T>
where
    B: AnalysisBackend,
    F: Future<Output = T>,
{
    let projector = RevealProjector::spawn(session.subscribe(channel), settings);
    let mut shown = projector.subscribe();
    let mut printer = ProgressPrinter::new(std::io::stdout());

    tokio::pin!(work);
    let result = loop {
        tokio::select! {
            result = &mut work => break result,
            Ok(()) = shown.changed() => {
                let text = shown.borrow_and_update().clone();
                printer.show(&text)?;
            }
        }
    };

    let target = match channel {
        Channel::Summary => session.snapshot().summary,
        Channel::CoverLetter => session.snapshot().cover_letter,
    };
    loop {
        let text = shown.borrow_and_update().clone();
        printer.show(&text)?;
        if text == target || shown.changed().await.is_err() {
            break;
        }
    }
    println!();
    Ok(result)
}

/// Writes only what a growing string added since the last call.
struct ProgressPrinter<W> {
    out: W,
    printed: String,
}

impl<W: Write> ProgressPrinter<W> {
    fn new(out: W) -> Self {
        Self {
            out,
            printed: String::new(),
        }
    }

    fn show(&mut self, text: &str) -> std::io::Result<()> {
        match text.strip_prefix(self.printed.as_str()) {
            Some(delta) => write!(self.out, "{delta}")?,
            None => write!(self.out, "\n{text}")?,
        }
        self.out.flush()?;
        self.printed = text.to_string();
        Ok(())
    }
}
