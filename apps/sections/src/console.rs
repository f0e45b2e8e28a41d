//! Terminal front-end: dialogs over stdin/stdout and the interactive shell.

use std::io::Write;

use async_trait::async_trait;
use client_core::{Interaction, SectionComposer, SectionError, SectionsClient};
use shared::domain::{PipeType, Section, SectionId, Weekday};
use tokio::{
    io::{AsyncBufReadExt, BufReader, Lines, Stdin},
    sync::Mutex,
};
use tracing::debug;

pub struct ConsoleInteraction {
    lines: Mutex<Lines<BufReader<Stdin>>>,
}

impl Default for ConsoleInteraction {
    fn default() -> Self {
        Self {
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        }
    }
}

impl ConsoleInteraction {
    /// Prints `prompt` and reads one line; `None` at end of input.
    pub async fn read_line(&self, prompt: &str) -> Option<String> {
        print!("{prompt}");
        if let Err(err) = std::io::stdout().flush() {
            debug!(%err, "failed to flush prompt");
        }
        self.lines.lock().await.next_line().await.ok().flatten()
    }
}

#[async_trait]
impl Interaction for ConsoleInteraction {
    async fn confirm(&self, title: &str, message: &str) -> bool {
        let answer = self.read_line(&format!("{title}: {message} [y/N] ")).await;
        answer.is_some_and(|answer| is_yes(&answer))
    }

    async fn prompt_text(&self, title: &str, message: &str, initial_value: &str) -> Option<String> {
        println!("{title}: {message}");
        let answer = self.read_line(&format!("[{initial_value}] > ")).await?;
        Some(prefilled_answer(&answer, initial_value))
    }

    async fn notify(&self, title: &str, message: &str) {
        println!("{title}: {message}");
    }
}

pub(crate) fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Enter keeps the pre-filled value, a lone `.` clears it.
pub(crate) fn prefilled_answer(answer: &str, initial_value: &str) -> String {
    match answer.trim() {
        "" => initial_value.to_string(),
        "." => String::new(),
        other => other.to_string(),
    }
}

pub fn format_elapsed(seconds: u64) -> String {
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}

pub fn print_sections(sections: &[Section]) {
    if sections.is_empty() {
        println!("no sections");
        return;
    }
    for section in sections {
        println!(
            "{}  {:<20} {} {:>4} min  [{}]  {:<10} {}",
            section.id,
            section.name,
            section.start_time,
            section.duration_minutes,
            section.selected_days,
            section.watering_type.label(),
            format_elapsed(section.elapsed_seconds),
        );
    }
}

pub fn print_pipes() {
    for pipe in PipeType::ALL {
        println!("{:<10} {} mm", pipe.label(), pipe.diameter_mm());
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ShellCommand {
    List,
    Toggle(Weekday),
    Draft,
    Add,
    Edit(SectionId),
    Delete(SectionId),
    Start(SectionId),
    Stop(SectionId),
    Pause(SectionId),
    Reset(SectionId),
    Running,
    Help,
    Quit,
    Empty,
}

const SHELL_HELP: &str = "\
commands:
  list              show all sections
  toggle DAY        select or unselect a day for the next section (pn wt śr cz pt sb nd)
  draft             fill in name, start time, duration and pipe for the next section
  add               save the drafted section
  edit ID           change every field of a section
  delete ID         remove a section
  start ID          start its watering timer
  stop ID           stop a running timer, or zero an idle one
  pause ID          stop a running timer keeping the count
  reset ID          stop the timer and zero the count
  running           list sections with a running timer
  help              show this text
  quit              leave the shell";

impl ShellCommand {
    pub(crate) fn parse(line: &str) -> Result<Self, String> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(ShellCommand::Empty);
        };
        let argument = words.next();
        if words.next().is_some() {
            return Err(format!("too many arguments for '{verb}'"));
        }

        let id = || {
            argument
                .map(SectionId::new)
                .ok_or_else(|| format!("'{verb}' needs a section id"))
        };

        let command = match verb.to_lowercase().as_str() {
            "list" | "ls" => ShellCommand::List,
            "toggle" => {
                let day = argument.ok_or_else(|| "'toggle' needs a day".to_string())?;
                ShellCommand::Toggle(day.parse().map_err(|err| format!("{err}"))?)
            }
            "draft" => ShellCommand::Draft,
            "add" => ShellCommand::Add,
            "edit" => ShellCommand::Edit(id()?),
            "delete" | "rm" => ShellCommand::Delete(id()?),
            "start" => ShellCommand::Start(id()?),
            "stop" => ShellCommand::Stop(id()?),
            "pause" => ShellCommand::Pause(id()?),
            "reset" => ShellCommand::Reset(id()?),
            "running" => ShellCommand::Running,
            "help" | "?" => ShellCommand::Help,
            "quit" | "exit" => ShellCommand::Quit,
            other => return Err(format!("unknown command '{other}', try 'help'")),
        };
        Ok(command)
    }
}

pub async fn run_shell(client: &SectionsClient, console: &ConsoleInteraction) {
    let mut composer = SectionComposer::new();
    println!("{} section(s) loaded, type 'help' for commands", client.sections().len());

    while let Some(line) = console.read_line("sections> ").await {
        let command = match ShellCommand::parse(&line) {
            Ok(command) => command,
            Err(message) => {
                println!("{message}");
                continue;
            }
        };
        if command == ShellCommand::Quit {
            break;
        }
        if let Err(err) = run_shell_command(client, console, &mut composer, command).await {
            client.report(&err).await;
            if !err.code().is_user_visible() {
                println!("{err}");
            }
        }
    }
}

async fn run_shell_command(
    client: &SectionsClient,
    console: &ConsoleInteraction,
    composer: &mut SectionComposer,
    command: ShellCommand,
) -> Result<(), SectionError> {
    match command {
        ShellCommand::List => print_sections(&client.sections()),
        ShellCommand::Toggle(day) => {
            let state = composer.toggle_day(day);
            println!("{day}: {state:?} (days: {})", composer.days().joined());
        }
        ShellCommand::Draft => fill_draft(console, composer).await?,
        ShellCommand::Add => {
            let section = client.add(composer).await?;
            println!("added {} ({})", section.name, section.id);
        }
        ShellCommand::Edit(id) => {
            let section = client.edit(&id).await?;
            println!("saved {}", section.name);
        }
        ShellCommand::Delete(id) => {
            if client.delete(&id).await? {
                println!("deleted {id}");
            }
        }
        ShellCommand::Start(id) => {
            client.start(&id).await?;
        }
        ShellCommand::Stop(id) => print_transition(client, &id, client.stop(&id).await?),
        ShellCommand::Pause(id) => print_transition(client, &id, client.pause(&id).await?),
        ShellCommand::Reset(id) => print_transition(client, &id, client.reset(&id).await?),
        ShellCommand::Running => {
            let running = client.running().await?;
            let sections: Vec<_> = client
                .sections()
                .into_iter()
                .filter(|section| running.contains(&section.id))
                .collect();
            print_sections(&sections);
        }
        ShellCommand::Help => println!("{SHELL_HELP}"),
        ShellCommand::Quit | ShellCommand::Empty => {}
    }
    Ok(())
}

fn print_transition(
    client: &SectionsClient,
    section_id: &SectionId,
    transition: client_core::TimerTransition,
) {
    let elapsed = client
        .section(section_id)
        .map(|section| format_elapsed(section.elapsed_seconds))
        .unwrap_or_default();
    println!("{section_id}: {transition:?} {elapsed}");
}

/// Prompts for the draft fields, pre-filled with what is there already.
async fn fill_draft(
    console: &ConsoleInteraction,
    composer: &mut SectionComposer,
) -> Result<(), SectionError> {
    let draft = &mut composer.draft;
    draft.name = ask(console, "Section name", &draft.name).await?;
    draft.start_time = ask(console, "Start time (HH:mm)", &draft.start_time).await?;
    draft.duration = ask(console, "Duration (minutes)", &draft.duration).await?;

    let current_pipe = draft.pipe.map(PipeType::label).unwrap_or_default();
    let pipe = ask(console, "Pipe type (16mm, 25mm, 32mm)", current_pipe).await?;
    draft.pipe = if pipe.trim().is_empty() {
        None
    } else {
        Some(
            pipe.parse()
                .map_err(|err| SectionError::Validation(format!("{err}")))?,
        )
    };
    Ok(())
}

async fn ask(
    console: &ConsoleInteraction,
    label: &'static str,
    initial: &str,
) -> Result<String, SectionError> {
    console
        .prompt_text("New section", label, initial)
        .await
        .ok_or(SectionError::Cancelled { field: label })
}

#[cfg(test)]
#[path = "tests/console_tests.rs"]
mod tests;
