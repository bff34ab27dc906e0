use std::{
    fs::{read_to_string, OpenOptions},
    io::{stdin, stdout, Write},
    path::{Path, PathBuf},
    process::Command,
    sync::Arc,
};

use log::{info, warn};
use shell_words::split;
use tempfile::Builder;

use crate::{
    copy_to_clipboard, hadith, parse_tags, quran, AlQuranCloud, Commands, Config, FileStore,
    Gateway, HadithService, Note, NoteRepository, NotesError, QuoteTarget, Result, Settings,
    SettingsStore, Theme, VerseProvider, VerseResolver,
};

const NO_RESULTS: &str = "No results, try different terms.";

/// CLI Application handler - processes commands against the note repository
pub struct App {
    notes: NoteRepository,
    settings: SettingsStore,
    hadith: HadithService,
    verses: VerseResolver,
    config: Config,
    verbose: bool,
}

impl App {
    /// Wires the application to the given storage and verse provider
    pub fn new(
        gateway: Arc<dyn Gateway>,
        provider: Arc<dyn VerseProvider>,
        config: Config,
        verbose: bool,
    ) -> Self {
        Self {
            notes: NoteRepository::new(Arc::clone(&gateway)),
            settings: SettingsStore::new(gateway),
            hadith: HadithService::new(),
            verses: VerseResolver::new(provider, config.chapter_preview_count),
            config,
            verbose,
        }
    }

    /// Opens the on-disk store and the HTTP verse provider named by `config`,
    /// then loads notes and settings.
    pub async fn open(config: Config, verbose: bool) -> Result<Self> {
        let gateway: Arc<dyn Gateway> = Arc::new(FileStore::new(config.data_dir.clone()));
        let provider: Arc<dyn VerseProvider> = Arc::new(AlQuranCloud::new(&config)?);
        let app = Self::new(gateway, provider, config, verbose);
        app.load().await;
        Ok(app)
    }

    /// Loads notes and settings; storage problems are reported, not fatal
    pub async fn load(&self) {
        let report = self.notes.load().await;
        if let Some(error) = report.error {
            eprintln!(
                "{} could not read saved notes: {}",
                console::style("Warning:").yellow(),
                error
            );
        }
        self.settings.load().await;
        if self.verbose {
            println!("Loaded {} notes", report.loaded);
        }
    }

    pub fn notes(&self) -> &NoteRepository {
        &self.notes
    }

    /// Run the CLI application with the given command
    pub async fn run(&self, command: Commands) -> Result<()> {
        match command {
            Commands::New {
                title,
                ustadz,
                date,
                content,
                file,
                tags,
                edit,
            } => {
                let note_content = self.resolve_content(content, file, edit, &title, "")?;
                let mut note = Note::new(title, ustadz, note_content.unwrap_or_default())
                    .with_tags(parse_tags(tags));
                if let Some(date) = date {
                    note.date = date;
                }
                self.notes.save(note.clone()).await?;
                println!("Note created with ID: {}", note.id);
            }

            Commands::Edit {
                id,
                title,
                ustadz,
                date,
                content,
                file,
                tags,
                add_tags,
                remove_tags,
                edit,
            } => {
                let mut note = self.require_note(&id)?;
                if let Some(content) =
                    self.resolve_content(content, file, edit, &note.title, &note.content)?
                {
                    note.content = content;
                }
                if let Some(title) = title {
                    note.title = title;
                }
                if let Some(ustadz) = ustadz {
                    note.ustadz = ustadz;
                }
                if let Some(date) = date {
                    note.date = date;
                }
                if tags.is_some() {
                    note.tags.clear();
                    for tag in parse_tags(tags) {
                        note.add_tag(&tag);
                    }
                }
                for tag in parse_tags(add_tags) {
                    note.add_tag(&tag);
                }
                for tag in parse_tags(remove_tags) {
                    note.remove_tag(&tag);
                }
                note.touch();
                self.notes.save(note).await?;
                println!("Note {} updated", id);
            }

            Commands::List {
                search,
                tag,
                favorites,
                limit,
                json,
            } => {
                let mut notes = self.notes.query(&search, &tag)?;
                if favorites {
                    notes.retain(|n| n.is_favorite);
                }
                if limit > 0 {
                    notes.truncate(limit);
                }
                self.display_notes(&notes, json)?;
            }

            Commands::Show { id, json } => {
                let note = self.require_note(&id)?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&note)?);
                } else {
                    self.display_note_detail(&note);
                }
            }

            Commands::Delete { id, force } => self.handle_delete(&id, force).await?,

            Commands::Favorite { id } => match self.notes.toggle_favorite(&id).await? {
                Some(note) if note.is_favorite => println!("Marked {} as favorite", id),
                Some(_) => println!("Removed {} from favorites", id),
                None => println!("No note with ID {}", id),
            },

            Commands::Tags => {
                let tags = self.notes.distinct_tags()?;
                if tags.is_empty() {
                    println!("No tags yet.");
                }
                for tag in tags {
                    println!("#{}", tag);
                }
            }

            Commands::Hadith { query, target } => match query {
                Some(query) => self.handle_hadith(&query, &target).await?,
                None => {
                    println!("Popular searches:");
                    for (label, query) in hadith::POPULAR_SEARCHES {
                        println!("  {:<12} kajian hadith {}", label, query);
                    }
                }
            },

            Commands::Verse { query, target } => self.handle_verse(&query, &target).await?,

            Commands::Surahs => {
                let chapters = self.verses.list_chapters().await;
                if chapters.is_empty() {
                    println!("{}", NO_RESULTS);
                }
                for chapter in chapters {
                    println!(
                        "{:>3}. {} ({}) - {} verses",
                        chapter.number,
                        chapter.english_name,
                        chapter.english_name_translation,
                        chapter.number_of_ayahs
                    );
                }
            }

            Commands::Settings {
                set,
                toggle_theme,
                reset,
            } => self.handle_settings(set, toggle_theme, reset).await?,
        }

        Ok(())
    }

    fn require_note(&self, id: &str) -> Result<Note> {
        self.notes.get(id)?.ok_or_else(|| NotesError::NoteNotFound {
            id: id.to_string(),
        })
    }

    /// Picks the note body from --content, --file or the editor.
    /// `None` means "leave as is".
    fn resolve_content(
        &self,
        content: Option<String>,
        file: Option<PathBuf>,
        open_editor: bool,
        title: &str,
        existing: &str,
    ) -> Result<Option<String>> {
        if content.is_some() && file.is_some() {
            return Err(NotesError::invalid_input(
                "Cannot specify both --content and --file",
            ));
        }

        match (content, file) {
            (Some(c), _) => Ok(Some(c)),
            (_, Some(path)) => {
                if !path.exists() {
                    return Err(NotesError::invalid_input(format!(
                        "File not found: {}",
                        path.display()
                    )));
                }
                Ok(Some(read_to_string(path)?))
            }
            (None, None) if open_editor => self.open_editor_with_content(title, existing).map(Some),
            (None, None) => Ok(None),
        }
    }

    fn open_editor_with_content(&self, title: &str, existing: &str) -> Result<String> {
        let temp_file = Builder::new().suffix(".html").tempfile()?;
        let temp_path = temp_file.path().to_path_buf();

        {
            let mut file = OpenOptions::new().write(true).open(&temp_path)?;
            writeln!(file, "<!-- {} -->", title)?;
            writeln!(file, "<!-- Write the note as HTML. Comment lines are dropped. -->")?;
            write!(file, "{}", existing)?;
        }

        let editor_cmd = self.config.get_editor_command();
        info!("Opening editor to write note content. Save and exit when done...");
        self.launch_editor(&editor_cmd, &temp_path)?;

        let content = read_to_string(&temp_path)?;
        Ok(content
            .lines()
            .filter(|line| {
                !(line.trim_start().starts_with("<!--") && line.trim_end().ends_with("-->"))
            })
            .collect::<Vec<&str>>()
            .join("\n"))
    }

    fn launch_editor(&self, editor_cmd: &str, file_path: &Path) -> Result<()> {
        let args = split(editor_cmd).map_err(|e| {
            NotesError::invalid_input(format!("Failed to parse editor command: {}", e))
        })?;
        let (program, rest) = args
            .split_first()
            .ok_or_else(|| NotesError::invalid_input("Empty editor command"))?;

        let status = Command::new(program)
            .args(rest)
            .arg(file_path)
            .status()
            .map_err(|e| NotesError::invalid_input(format!("Cannot start {}: {}", program, e)))?;

        if !status.success() {
            return Err(NotesError::invalid_input("Editor exited with non-zero status"));
        }
        Ok(())
    }

    async fn handle_delete(&self, id: &str, force: bool) -> Result<()> {
        let Some(note) = self.notes.get(id)? else {
            println!("No note with ID {}", id);
            return Ok(());
        };

        if !force {
            print!("Delete \"{}\"? [y/N] ", note.title);
            stdout().flush()?;
            let mut answer = String::new();
            stdin().read_line(&mut answer)?;
            if !matches!(answer.trim().to_lowercase().as_str(), "y" | "yes") {
                println!("Cancelled");
                return Ok(());
            }
        }

        self.notes.remove(id).await?;
        println!("Note {} deleted", id);
        Ok(())
    }

    async fn handle_hadith(&self, query: &str, target: &QuoteTarget) -> Result<()> {
        let results = self.hadith.search(query);
        if target.json {
            println!("{}", serde_json::to_string_pretty(&results)?);
        } else if results.is_empty() {
            println!("{}", NO_RESULTS);
        } else {
            for h in &results {
                println!(
                    "[{}] {} - {} ({})",
                    h.id,
                    console::style(&h.book).bold(),
                    h.chapter,
                    h.grade
                );
                println!("  {}", h.text);
                println!("  \"{}\"", console::style(&h.translation).italic());
                println!("  Narrator: {}\n", h.narrator);
            }
        }

        if let Some(first) = results.first() {
            self.deliver_quote(&hadith::format_for_insertion(first), target)
                .await?;
        }
        Ok(())
    }

    async fn handle_verse(&self, query: &str, target: &QuoteTarget) -> Result<()> {
        let verses = match self.verses.try_search(query).await {
            Ok(verses) => verses,
            Err(e) => {
                warn!("Verse lookup failed: {}", e);
                eprintln!(
                    "{} verse provider unavailable",
                    console::style("Warning:").yellow()
                );
                Vec::new()
            }
        };

        if target.json {
            println!("{}", serde_json::to_string_pretty(&verses)?);
        } else if verses.is_empty() {
            println!("{}", NO_RESULTS);
        } else {
            for verse in &verses {
                println!("{}", console::style(quran::format_reference(verse)).bold());
                println!("  {}", verse.text);
                println!("  \"{}\"\n", console::style(&verse.translation).italic());
            }
        }

        if let Some(first) = verses.first() {
            self.deliver_quote(&quran::format_for_insertion(first), target)
                .await?;
        }
        Ok(())
    }

    /// Inserts formatted markup into a note and/or copies it, as requested
    async fn deliver_quote(&self, markup: &str, target: &QuoteTarget) -> Result<()> {
        if let Some(id) = &target.insert_into {
            let mut note = self.require_note(id)?;
            if !note.content.is_empty() {
                note.content.push('\n');
            }
            note.content.push_str(markup);
            note.touch();
            self.notes.save(note).await?;
            println!("Inserted into note {}", id);
        }

        if target.copy {
            if copy_to_clipboard(markup, self.config.clipboard_command.as_deref()) {
                println!("Copied to clipboard");
            } else {
                println!("Could not copy to clipboard");
            }
        }
        Ok(())
    }

    async fn handle_settings(&self, set: Vec<String>, toggle_theme: bool, reset: bool) -> Result<()> {
        let mut updated = if reset {
            Settings::default()
        } else {
            self.settings.current()
        };
        for assignment in &set {
            updated.set(assignment)?;
        }
        if toggle_theme {
            updated.theme = match updated.theme {
                Theme::Light => Theme::Dark,
                Theme::Dark => Theme::Light,
            };
        }

        let settings = if reset || toggle_theme || !set.is_empty() {
            self.settings.update(|s| *s = updated).await?
        } else {
            self.settings.current()
        };

        println!("theme:     {}", settings.theme);
        println!("language:  {}", settings.language);
        println!("auto_save: {}", settings.auto_save);
        println!("font_size: {}", settings.font_size);
        Ok(())
    }

    fn display_notes(&self, notes: &[Note], json: bool) -> Result<()> {
        if json {
            println!("{}", serde_json::to_string_pretty(notes)?);
            return Ok(());
        }

        if notes.is_empty() {
            println!("No notes found matching the criteria.");
            return Ok(());
        }

        let term_width = terminal_size::terminal_size()
            .map(|(w, _)| w.0 as usize)
            .unwrap_or(80);

        for (i, note) in notes.iter().enumerate() {
            if i > 0 {
                println!("{}", "-".repeat(term_width.min(50)));
            }

            let star = if note.is_favorite { "★ " } else { "" };
            println!("{}{}", star, console::style(&note.title).bold());
            println!("ID: {} | {} | {}", note.id, note.date, note.ustadz);

            if !note.tags.is_empty() {
                let tags = note
                    .tags
                    .iter()
                    .map(|tag| format!("#{}", tag))
                    .collect::<Vec<_>>()
                    .join(" ");
                println!("Tags: {}", console::style(tags).cyan());
            }

            let preview = note.preview(term_width.saturating_sub(4).max(20));
            if !preview.is_empty() {
                println!("{}", preview);
            }
        }

        println!(
            "\nFound {} note{}",
            notes.len(),
            if notes.len() == 1 { "" } else { "s" }
        );
        Ok(())
    }

    fn display_note_detail(&self, note: &Note) {
        println!("{}", console::style(&note.title).bold());
        println!("ID:      {}", note.id);
        println!("Ustadz:  {}", note.ustadz);
        println!("Date:    {}", note.date);
        if !note.tags.is_empty() {
            println!("Tags:    {}", console::style(note.tags.join(", ")).cyan());
        }
        println!("Updated: {}", note.updated_at.format("%Y-%m-%d %H:%M"));
        if note.is_favorite {
            println!("Favorite");
        }
        println!("\n{}", note.content);
    }
}
