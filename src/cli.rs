use clap::{Parser, ValueEnum};
use ppdf_lib::{LoadMode, DEFAULT_MATHJAX_URL};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ppdf")]
#[command(
    version,
    about = "Convert an HTML page to PDF with a headless browser",
    long_about = "ppdf\n\nRenders PAGE (a URL or a local HTML file) or HTML read from stdin and exports it as PDF.\nBrowser options are relaxed literals, e.g. \"{pdf={format='A4'}, waitFor=[1000]}\".\nWithout --out the PDF is printed to stdout as a base64 data URI."
)]
pub struct Cli {
    #[arg(value_name = "PAGE", help = "URL or local file path; HTML is read from stdin when omitted")]
    pub page: Option<String>,

    #[arg(
        short,
        long,
        value_name = "LITERAL",
        help = "Browser options replacing the defaults (launch/goto/emulateMedia/waitForNavigation/waitFor/pdf)"
    )]
    pub args: Option<String>,

    #[arg(
        short,
        long,
        value_name = "LITERAL",
        help = "Options deep-merged over --args or the defaults"
    )]
    pub upd: Option<String>,

    #[arg(short, long, value_name = "PATH", help = "Output PDF path (stdout data URI if omitted)")]
    pub out: Option<PathBuf>,

    #[arg(
        short,
        long,
        value_name = "PATH",
        help = "Directory for the temp HTML file of --goto temp (defaults to the output directory)"
    )]
    pub dir: Option<PathBuf>,

    #[arg(short, long, value_enum, value_name = "MODE", help = "How the page is loaded")]
    pub goto: Option<GotoMode>,

    #[arg(
        long,
        value_name = "URL",
        num_args = 0..=1,
        default_missing_value = DEFAULT_MATHJAX_URL,
        help = "Replace MathJax scripts in stdin HTML with an async load of URL"
    )]
    pub mathjax: Option<String>,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(
        long,
        value_name = "PATH",
        help = "Optional config file (TOML) with node_command, args, upd and timeouts; CLI flags override config"
    )]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum GotoMode {
    Url,
    #[value(name = "setContent")]
    SetContent,
    Temp,
    #[value(name = "data-text-html")]
    DataTextHtml,
}

impl From<GotoMode> for LoadMode {
    fn from(mode: GotoMode) -> Self {
        match mode {
            GotoMode::Url => LoadMode::Url,
            GotoMode::SetContent => LoadMode::SetContent,
            GotoMode::Temp => LoadMode::Temp,
            GotoMode::DataTextHtml => LoadMode::DataTextHtml,
        }
    }
}

pub fn parse() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::{Cli, GotoMode};
    use clap::Parser;
    use ppdf_lib::{LoadMode, DEFAULT_MATHJAX_URL};

    #[test]
    fn bare_invocation_uses_defaults() {
        let cli = Cli::parse_from(["ppdf"]);

        assert!(cli.page.is_none());
        assert!(cli.args.is_none());
        assert!(cli.upd.is_none());
        assert!(cli.out.is_none());
        assert!(cli.dir.is_none());
        assert!(cli.goto.is_none());
        assert!(cli.mathjax.is_none());
        assert!(!cli.verbose);
        assert!(cli.config.is_none());
    }

    #[test]
    fn short_flags_are_accepted() {
        let cli = Cli::parse_from([
            "ppdf",
            "https://example.com",
            "-a",
            "{pdf={}}",
            "-u",
            "{waitFor=[1]}",
            "-o",
            "out.pdf",
            "-d",
            "tmp",
            "-g",
            "setContent",
            "--config",
            "ppdf.toml",
            "--verbose",
        ]);

        assert_eq!(cli.page.as_deref(), Some("https://example.com"));
        assert_eq!(cli.args.as_deref(), Some("{pdf={}}"));
        assert_eq!(cli.upd.as_deref(), Some("{waitFor=[1]}"));
        assert_eq!(cli.out.as_deref(), Some(std::path::Path::new("out.pdf")));
        assert_eq!(cli.dir.as_deref(), Some(std::path::Path::new("tmp")));
        assert_eq!(cli.goto, Some(GotoMode::SetContent));
        assert_eq!(cli.config.as_deref(), Some(std::path::Path::new("ppdf.toml")));
        assert!(cli.verbose);
    }

    #[test]
    fn goto_accepts_every_load_mode_name() {
        for mode in LoadMode::ALL {
            let cli = Cli::parse_from(["ppdf", "--goto", mode.as_str()]);
            assert_eq!(cli.goto.map(LoadMode::from), Some(mode));
        }
        assert!(Cli::try_parse_from(["ppdf", "--goto", "file"]).is_err());
    }

    #[test]
    fn mathjax_flag_defaults_its_url() {
        let cli = Cli::parse_from(["ppdf", "--mathjax"]);
        assert_eq!(cli.mathjax.as_deref(), Some(DEFAULT_MATHJAX_URL));

        let cli = Cli::parse_from(["ppdf", "--mathjax", "https://cdn.example/mj.js"]);
        assert_eq!(cli.mathjax.as_deref(), Some("https://cdn.example/mj.js"));
    }
}
