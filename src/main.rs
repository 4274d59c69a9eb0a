//! smartmarks console client.
//!
//! Reads one command per line from stdin and prints the resulting screen.
//! `help` lists the commands.

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use smartmarks::app::{self, App};
use smartmarks::controller::{ControllerHandle, Outcome};
use smartmarks::types::bookmark::BookmarkId;
use smartmarks::view::renderer::render_text;
use smartmarks::view::View;

#[derive(Debug, Parser)]
#[command(name = "smartmarks", version, about = "Personal bookmarks with live sync")]
struct Args {
    /// Use the in-process backend; sign-in completes without a browser.
    #[arg(long)]
    offline: bool,

    /// Settings file (defaults to the platform config dir).
    #[arg(long)]
    config: Option<String>,
}

const HELP: &[&str] = &[
    "  login                 sign in with the configured provider",
    "  callback <url>        finish sign-in with the redirect URL",
    "  logout                sign out",
    "  add <title> <url>     add a bookmark (title may be quoted)",
    "  edit <n>              load bookmark n into the form",
    "  title <text>          set the form title",
    "  url <text>            set the form url",
    "  submit                add or update from the form",
    "  cancel                leave edit mode",
    "  rm <n>                delete bookmark n",
    "  clear                 delete all your bookmarks",
    "  refresh               reload from the server",
    "  quit",
];

fn print_view(view: &View) {
    println!();
    for line in render_text(view) {
        println!("{line}");
    }
    println!();
}

/// Splits `add` arguments into title and url. The url is the last word.
fn split_title_url(rest: &str) -> Option<(String, String)> {
    let rest = rest.trim();
    let (title, url) = rest.rsplit_once(char::is_whitespace)?;
    let title = title.trim().trim_matches('"');
    Some((title.to_string(), url.to_string()))
}

/// Maps a 1-based list position to a bookmark id.
fn id_at(view: &View, arg: &str) -> Option<BookmarkId> {
    let n: usize = arg.trim().parse().ok()?;
    view.items()
        .iter()
        .find(|item| item.index == n)
        .map(|item| item.id.clone())
}

struct Console {
    app: App,
    lines: Lines<BufReader<Stdin>>,
}

impl Console {
    fn handle(&self) -> &ControllerHandle {
        &self.app.handle
    }

    async fn ask(&mut self, prompt: &str) -> anyhow::Result<bool> {
        println!("{prompt} [y/N]");
        let answer = self.lines.next_line().await?.unwrap_or_default();
        Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
    }

    async fn login(&mut self) -> anyhow::Result<Outcome> {
        let outcome = self.handle().sign_in().await?;
        let Some(url) = outcome.redirect_url.clone() else {
            return Ok(outcome);
        };
        if self.app.memory.is_some() {
            let callback = format!("{}#user=demo&name=Demo", self.app.settings.auth.redirect_to);
            return Ok(self.handle().complete_sign_in(&callback).await?);
        }
        println!("Open this address in a browser, then paste the final URL with `callback <url>`:");
        println!("  {url}");
        Ok(outcome)
    }

    /// Runs one line. `Ok(None)` means quit.
    async fn run_line(&mut self, line: &str) -> anyhow::Result<Option<Outcome>> {
        let (command, rest) = line
            .trim()
            .split_once(char::is_whitespace)
            .unwrap_or((line.trim(), ""));
        let view = self.handle().view();
        let unknown_item = || anyhow::anyhow!("no bookmark at position {}", rest.trim());

        let outcome = match command {
            "quit" | "exit" => return Ok(None),
            "help" => {
                HELP.iter().for_each(|line| println!("{line}"));
                self.handle().snapshot().await?
            }
            "login" => self.login().await?,
            "callback" => self.handle().complete_sign_in(rest.trim()).await?,
            "logout" => self.handle().sign_out().await?,
            "add" => match split_title_url(rest) {
                Some((title, url)) => self.handle().insert(&title, &url).await?,
                None => anyhow::bail!("usage: add <title> <url>"),
            },
            "edit" => {
                let id = id_at(&view, rest).ok_or_else(unknown_item)?;
                self.handle().begin_edit(&id).await?
            }
            "title" => self.handle().set_form(Some(rest.trim()), None).await?,
            "url" => self.handle().set_form(None, Some(rest.trim())).await?,
            "submit" | "update" => self.handle().submit().await?,
            "cancel" => self.handle().cancel_edit().await?,
            "rm" | "delete" => {
                let id = id_at(&view, rest).ok_or_else(unknown_item)?;
                self.handle().delete(&id).await?
            }
            "clear" => {
                let confirmed = self.ask(smartmarks::managers::bookmark_manager::CLEAR_ALL_PROMPT).await?;
                self.handle().clear_all(confirmed).await?
            }
            "refresh" => self.handle().refresh().await?,
            "" => self.handle().snapshot().await?,
            other => anyhow::bail!("unknown command `{other}`, try `help`"),
        };
        Ok(Some(outcome))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    app::init_tracing();
    let args = Args::parse();
    let app = App::launch(args.config, args.offline)?;
    let mut console = Console {
        app,
        lines: BufReader::new(tokio::io::stdin()).lines(),
    };

    let first = console.handle().snapshot().await?;
    print_view(&first.view);

    while let Some(line) = console.lines.next_line().await? {
        match console.run_line(&line).await {
            Ok(Some(outcome)) => print_view(&outcome.view),
            Ok(None) => break,
            Err(e) => eprintln!("error: {e:#}"),
        }
    }

    console.app.shutdown().await
}
