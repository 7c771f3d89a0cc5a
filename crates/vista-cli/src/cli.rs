use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "vista", about = "Inspect Vista object stores", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the schema stored in a file
    Schema(SchemaArgs),
    /// Count the objects of a type
    Count(CountArgs),
    /// List the objects of a type
    Query(QueryArgs),
}

#[derive(Args)]
pub struct SchemaArgs {
    pub path: String,
}

#[derive(Args)]
pub struct CountArgs {
    pub path: String,
    pub object_type: String,
    /// Predicate, e.g. "age > 18 AND name BEGINSWITH[c] 'a'"
    #[arg(long)]
    pub filter: Option<String>,
}

#[derive(Args)]
pub struct QueryArgs {
    pub path: String,
    pub object_type: String,
    #[arg(long)]
    pub filter: Option<String>,
    /// Sort key as `property[:asc|:desc]`; repeat for tie-breakers
    #[arg(long = "sort", value_parser = parse_sort_key)]
    pub sort: Vec<(String, bool)>,
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,
}

/// Parse `name`, `name:asc` or `name:desc` into `(name, ascending)`.
pub fn parse_sort_key(s: &str) -> Result<(String, bool), String> {
    let (name, ascending) = match s.rsplit_once(':') {
        Some((name, "asc")) => (name, true),
        Some((name, "desc")) => (name, false),
        Some((_, other)) => return Err(format!("unknown sort direction `{other}`")),
        None => (s, true),
    };
    if name.is_empty() {
        return Err("sort key needs a property name".into());
    }
    Ok((name.to_string(), ascending))
}
