use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Main CLI application arguments and command structure
#[derive(Parser)]
#[clap(
    name = "kajian",
    version,
    about = "Lecture notes with hadith and Quran quotations"
)]
pub struct Cli {
    /// Path to the configuration file
    #[clap(short = 'c', long, value_parser)]
    pub config: Option<PathBuf>,

    /// Directory holding notes and settings (overrides the config file)
    #[clap(long, value_parser)]
    pub data_dir: Option<PathBuf>,

    /// Verbose output mode
    #[clap(short, long)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Commands,
}

/// Where a looked-up quotation should go
#[derive(Args, Debug, Clone, Default)]
pub struct QuoteTarget {
    /// Append the first result to the note with this ID
    #[clap(short, long)]
    pub insert_into: Option<String>,

    /// Copy the first result's markup to the clipboard
    #[clap(long)]
    pub copy: bool,

    /// Print results as JSON
    #[clap(short, long)]
    pub json: bool,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Create a new note
    New {
        /// Title of the note
        #[clap(short = 'T', long)]
        title: String,

        /// Teacher or speaker of the lecture
        #[clap(short, long, default_value = "")]
        ustadz: String,

        /// Lecture date (YYYY-MM-DD), defaults to today
        #[clap(short, long)]
        date: Option<String>,

        /// Content of the note as markup
        #[clap(short, long)]
        content: Option<String>,

        /// Path to a file containing the note's content
        #[clap(short, long)]
        file: Option<PathBuf>,

        /// Tags to associate with the note (comma-separated)
        #[clap(short = 't', long)]
        tags: Option<String>,

        /// Open content in editor before saving
        #[clap(short, long)]
        edit: bool,
    },

    /// Edit an existing note; the note is saved whole
    Edit {
        /// ID of the note to edit
        id: String,

        #[clap(short = 'T', long)]
        title: Option<String>,

        #[clap(short, long)]
        ustadz: Option<String>,

        #[clap(short, long)]
        date: Option<String>,

        /// New content for the note
        #[clap(short, long)]
        content: Option<String>,

        /// Path to a file containing the new content
        #[clap(short, long)]
        file: Option<PathBuf>,

        /// Replace all tags (comma-separated)
        #[clap(short = 't', long)]
        tags: Option<String>,

        /// Tags to add (comma-separated)
        #[clap(long)]
        add_tags: Option<String>,

        /// Tags to remove (comma-separated)
        #[clap(long)]
        remove_tags: Option<String>,

        /// Open the current content in the editor
        #[clap(short, long)]
        edit: bool,
    },

    /// List notes, newest first, with optional filtering
    List {
        /// Text to look for in title, content and speaker
        #[clap(short, long, default_value = "")]
        search: String,

        /// Only notes carrying any of these tags (repeatable)
        #[clap(short, long)]
        tag: Vec<String>,

        /// Only favorite notes
        #[clap(short = 'F', long)]
        favorites: bool,

        /// Limit the number of notes returned (0 for no limit)
        #[clap(short = 'n', long, default_value_t = 10)]
        limit: usize,

        /// Format output as JSON
        #[clap(short, long)]
        json: bool,
    },

    /// Show a note by ID
    Show {
        id: String,

        /// Format output as raw JSON
        #[clap(short, long)]
        json: bool,
    },

    /// Delete a note by ID
    Delete {
        id: String,

        /// Skip confirmation prompt
        #[clap(short, long)]
        force: bool,
    },

    /// Toggle the favorite flag of a note
    Favorite { id: String },

    /// List every tag in use
    Tags,

    /// Search the bundled hadith collection
    Hadith {
        /// Search text; omit to see suggested searches
        query: Option<String>,

        #[clap(flatten)]
        target: QuoteTarget,
    },

    /// Look up Quran verses: "2:255", "36", or a name like "ayat kursi"
    Verse {
        query: String,

        #[clap(flatten)]
        target: QuoteTarget,
    },

    /// List the surahs known to the verse provider
    Surahs,

    /// Show or change preferences
    Settings {
        /// Set a preference, e.g. theme=dark or font_size=lg
        #[clap(short, long)]
        set: Vec<String>,

        /// Switch between light and dark theme
        #[clap(long)]
        toggle_theme: bool,

        /// Reset preferences to defaults
        #[clap(short, long)]
        reset: bool,
    },
}
