//! CLI argument parsing using clap

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Transform XML models through XSLT and patch them from a rule-driven questionnaire
#[derive(Parser, Debug)]
#[command(name = "rulepatch")]
#[command(author, version, about, long_about = None)]
#[command(after_help = r#"EXAMPLES:
    # Which elements does a rule path select?
    rulepatch query model.xml -x "//object[@type='comm_thread']"

    # Show the questionnaire a rule file produces
    rulepatch questionnaire model.xml -r PIM-PSM-Rules.json

    # Write an answers template, edit it, then apply it
    rulepatch questionnaire model.xml -r rules.json -o answers > answers.json
    rulepatch apply model.xml -r rules.json -a answers.json --out patched.xml

    # Run a preset's XSLT chain through the transform service
    rulepatch transform model.xml --preset pim-psm --platform esp32 --comm-tech wifi

    # Everything at once: transform, answer, export
    rulepatch run model.xml --preset pim-psm -a answers.json
"#)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Config file (TOML)
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// More log output (-v info, -vv debug); RUST_LOG overrides
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Evaluate an XPath 3.1 expression and list the matched elements
    Query {
        /// XML document
        document: PathBuf,

        /// XPath expression (a leading // is added when the path is relative)
        #[arg(short = 'x', long = "xpath")]
        xpath: String,

        /// Output format: xml (default), label, count
        #[arg(short = 'o', long = "output", default_value = "xml")]
        output: String,

        /// Expected result: none, some, or a number (exit 1 if not met)
        #[arg(short = 'e', long = "expect")]
        expect: Option<String>,
    },

    /// Print the questionnaire compiled from a rule file
    Questionnaire {
        /// XML document
        document: PathBuf,

        /// Rule file (JSON)
        #[arg(short = 'r', long = "rules")]
        rules: PathBuf,

        /// Output format: text (default), json, answers
        #[arg(short = 'o', long = "output", default_value = "text")]
        output: String,
    },

    /// Apply an answers file to a document
    Apply {
        /// XML document
        document: PathBuf,

        /// Rule file (JSON)
        #[arg(short = 'r', long = "rules")]
        rules: PathBuf,

        /// Answers file (JSON object of field keys)
        #[arg(short = 'a', long = "answers")]
        answers: PathBuf,

        #[command(flatten)]
        export: ExportArgs,
    },

    /// Run an XSLT chain through the transform service
    Transform {
        /// XML document
        document: PathBuf,

        #[command(flatten)]
        chain: ChainArgs,

        #[command(flatten)]
        export: ExportArgs,
    },

    /// Transform, apply answers, then export
    Run {
        /// XML document
        document: PathBuf,

        #[command(flatten)]
        chain: ChainArgs,

        /// Rule file (JSON); defaults to the preset's
        #[arg(short = 'r', long = "rules")]
        rules: Option<PathBuf>,

        /// Answers file (JSON object of field keys)
        #[arg(short = 'a', long = "answers")]
        answers: Option<PathBuf>,

        #[command(flatten)]
        export: ExportArgs,
    },
}

/// Which stylesheets to run and where
#[derive(clap::Args, Debug)]
pub struct ChainArgs {
    /// Preset from the config file, or "custom"
    #[arg(short = 'p', long = "preset")]
    pub preset: Option<String>,

    /// XSLT file, applied in the order given (repeatable)
    #[arg(short = 's', long = "xslt")]
    pub xslt: Vec<PathBuf>,

    /// Target platform, stamped on the root for presets that ask for it
    #[arg(long = "platform", requires = "comm_tech")]
    pub platform: Option<String>,

    /// Communication technology, stamped with --platform
    #[arg(long = "comm-tech", requires = "platform")]
    pub comm_tech: Option<String>,

    /// Transform service URL (overrides the config)
    #[arg(long = "service-url")]
    pub service_url: Option<String>,
}

/// Where the resulting document goes
#[derive(clap::Args, Debug)]
pub struct ExportArgs {
    /// Output file (defaults to the configured export file name)
    #[arg(long = "out", conflicts_with = "stdout")]
    pub out: Option<PathBuf>,

    /// Print the document instead of writing a file
    #[arg(long = "stdout")]
    pub stdout: bool,
}
