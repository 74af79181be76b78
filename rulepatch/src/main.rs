//! rulepatch - Rule-driven questionnaires for XML models
//!
//! This is the main CLI entry point that wires files, config and the
//! transform service into an editing session.

mod cli;
mod render;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use rulepatch_core::{
    Document, EditorConfig, EditorError, EditorSession, HttpTransformService, PathQuery,
    Questionnaire, RulesStatus, Submission, TransformService,
};

use cli::{Args, ChainArgs, Command, ExportArgs};

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(args: Args) -> Result<ExitCode> {
    let config = match &args.config {
        Some(path) => EditorConfig::load(path)?,
        None => EditorConfig::default(),
    };

    match args.command {
        Command::Query {
            document,
            xpath,
            output,
            expect,
        } => run_query(&document, &xpath, &output, expect.as_deref()),
        Command::Questionnaire { document, rules, output } => {
            let mut session = EditorSession::new(config);
            session.load_document(&read(&document)?)?;
            load_rules(&mut session, &rules)?;
            print_questionnaire(&session, &output)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Apply {
            document,
            rules,
            answers,
            export,
        } => {
            let mut session = EditorSession::new(config);
            session.load_document(&read(&document)?)?;
            load_rules(&mut session, &rules)?;
            submit_answers(&mut session, &answers)?;
            export_document(&session, &export)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Transform { document, chain, export } => {
            let mut session = EditorSession::new(config);
            session.load_document(&read(&document)?)?;
            let service = http_service(&session, &chain);
            transform_or_export_partial(&mut session, &chain, &service, &export)?;
            export_document(&session, &export)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Run {
            document,
            chain,
            rules,
            answers,
            export,
        } => {
            let mut session = EditorSession::new(config);
            session.load_document(&read(&document)?)?;
            let service = http_service(&session, &chain);
            transform_or_export_partial(&mut session, &chain, &service, &export)?;
            if let Some(rules) = &rules {
                load_rules(&mut session, rules)?;
            }
            if let Some(answers) = &answers {
                submit_answers(&mut session, answers)?;
            }
            export_document(&session, &export)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))
}

fn load_rules(session: &mut EditorSession, path: &Path) -> Result<()> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    if session.load_rules(&name, &read(path)?)? == RulesStatus::NoRules {
        eprintln!("note: {} has no modification rules", name);
    }
    Ok(())
}

fn submit_answers(session: &mut EditorSession, path: &Path) -> Result<()> {
    let submission = Submission::from_json(&read(path)?).with_context(|| format!("in {}", path.display()))?;
    let report = session.submit(&submission)?;
    for key in &report.unused_keys {
        eprintln!("warning: answer `{}` matches no field", key);
    }
    eprintln!(
        "{} attribute(s) changed on {} matched element(s)",
        report.writes.len(),
        report.elements_matched
    );
    Ok(())
}

fn http_service(session: &EditorSession, chain: &ChainArgs) -> HttpTransformService {
    let url = chain
        .service_url
        .clone()
        .unwrap_or_else(|| session.config().service_url.clone());
    let service = HttpTransformService::new(url, session.config().service_timeout());
    tracing::info!("transform service: {}", service.url());
    service
}

/// Run the chain. When a step fails, the output of the last good step is
/// still exported before the failure is reported.
fn transform_or_export_partial(
    session: &mut EditorSession,
    chain: &ChainArgs,
    service: &dyn TransformService,
    export: &ExportArgs,
) -> Result<()> {
    match transform(session, chain, service) {
        Err(e) if matches!(e.downcast_ref::<EditorError>(), Some(EditorError::RemoteTransformFailure { .. })) => {
            export_document(session, export)?;
            Err(e)
        }
        other => other,
    }
}

fn transform(session: &mut EditorSession, chain: &ChainArgs, service: &dyn TransformService) -> Result<()> {
    if let Some(preset) = &chain.preset {
        session.select_preset(preset)?;
    }
    for path in &chain.xslt {
        let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        session.add_xslt(&name, &read(path)?);
    }
    if let (Some(platform), Some(comm_tech)) = (&chain.platform, &chain.comm_tech) {
        session.set_platform(platform, comm_tech);
    }

    let completed = session.run_transformations(service)?;
    eprintln!("{} transformation step(s) applied", completed);
    Ok(())
}

fn export_document(session: &EditorSession, export: &ExportArgs) -> Result<()> {
    let exported = session.export()?;
    if export.stdout {
        println!("{}", exported.content);
        return Ok(());
    }
    let path = export.out.clone().unwrap_or_else(|| PathBuf::from(&exported.file_name));
    std::fs::write(&path, &exported.content).with_context(|| format!("cannot write {}", path.display()))?;
    eprintln!("wrote {}", path.display());
    Ok(())
}

fn print_questionnaire(session: &EditorSession, output: &str) -> Result<()> {
    let form = match session.questionnaire()? {
        Questionnaire::Ready(form) => form,
        Questionnaire::NoRules => {
            eprintln!("no rules loaded, nothing to ask");
            return Ok(());
        }
    };
    match output {
        "text" => print!("{}", render::questionnaire_text(&form)),
        "json" => println!("{}", serde_json::to_string_pretty(form.groups())?),
        "answers" => println!(
            "{}",
            serde_json::to_string_pretty(&render::answers_template(form.groups()))?
        ),
        other => bail!("invalid format '{}'. Valid formats: text, json, answers", other),
    }
    Ok(())
}

fn run_query(path: &Path, xpath: &str, output: &str, expect: Option<&str>) -> Result<ExitCode> {
    let xpath = normalize_xpath(xpath);
    let document = Document::parse(&read(path)?)?;
    let matches = PathQuery::evaluate(&document, &xpath)?;

    match output {
        "xml" => {
            for &node in &matches {
                println!("{}", document.node_to_string(node)?);
            }
        }
        "label" => {
            for &node in &matches {
                let label = document.attribute(node, "label").unwrap_or_default();
                println!("{}\t{}", document.describe(node), label);
            }
        }
        "count" => println!("{}", matches.len()),
        other => bail!("invalid format '{}'. Valid formats: xml, label, count", other),
    }

    if let Some(expect) = expect {
        if !expectation_met(expect, matches.len())? {
            eprintln!("expected {}, got {} matches", expect, matches.len());
            return Ok(ExitCode::FAILURE);
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// `none`, `some`, or an exact count
fn expectation_met(expect: &str, count: usize) -> Result<bool> {
    Ok(match expect {
        "none" => count == 0,
        "some" => count > 0,
        n => {
            let expected: usize = n
                .parse()
                .with_context(|| format!("invalid expectation '{}': use 'none', 'some', or a number", n))?;
            count == expected
        }
    })
}

/// Prefix relative paths with `//`, so `object[@type='x']` searches the whole document
fn normalize_xpath(xpath: &str) -> String {
    let xpath = fix_msys_xpath_mangling(xpath);
    if xpath.starts_with('/') || xpath.starts_with('(') || xpath == "." {
        xpath
    } else {
        format!("//{}", xpath)
    }
}

/// MSYS rewrites a leading `//item` argument to `/item`; restore it
fn fix_msys_xpath_mangling(xpath: &str) -> String {
    if std::env::var("MSYSTEM").is_err() {
        return xpath.to_string();
    }
    match xpath.strip_prefix('/') {
        Some(rest) if !rest.starts_with('/') && rest.chars().next().is_some_and(|c| c.is_alphabetic() || c == '*') => {
            format!("/{}", xpath)
        }
        _ => xpath.to_string(),
    }
}
