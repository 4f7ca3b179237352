use std::path::PathBuf;

use clap::builder::FalseyValueParser;
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Enable debug logging (RUST_LOG takes over when set)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List resources in a state file
    List(ListArgs),
    /// Write one resource's JSON to a file
    Export(ExportArgs),
    /// Set an attribute on a resource instance
    Modify(ModifyArgs),
    /// Rename a resource address
    Move(MoveArgs),
    /// Remove a resource from state (the real object is left alone)
    Delete(DeleteArgs),
    /// Check a state file for structural problems
    Validate(ValidateArgs),
    /// Find state files under a directory
    Find(FindArgs),
    /// List the backups taken of a state file
    Backups(BackupsArgs),
    /// Restore a state file from one of its backups
    Rollback(RollbackArgs),
}

impl Command {
    pub fn force(&self) -> bool {
        match self {
            Command::Export(args) => args.force.force,
            Command::Modify(args) => args.force.force,
            Command::Move(args) => args.force.force,
            Command::Delete(args) => args.force.force,
            Command::Rollback(args) => args.force.force,
            Command::List(_) | Command::Validate(_) | Command::Find(_) | Command::Backups(_) => {
                false
            }
        }
    }
}

#[derive(clap::Args, Debug)]
pub struct ForceArg {
    /// Skip the confirmation prompt
    #[arg(
        short,
        long,
        env = "TFSTATE_TOOL_FORCE",
        value_parser = FalseyValueParser::new()
    )]
    pub force: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListFormat {
    Tree,
    Table,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    pub state_file: PathBuf,

    /// Only resources of this exact type
    #[arg(long = "type")]
    pub resource_type: Option<String>,

    /// Glob on the resource name (`*` and `?`)
    #[arg(long)]
    pub name: Option<String>,

    #[arg(long, value_enum, default_value_t = ListFormat::Tree, env = "TFSTATE_TOOL_FORMAT")]
    pub format: ListFormat,
}

#[derive(clap::Args, Debug)]
pub struct ExportArgs {
    pub state_file: PathBuf,
    pub address: String,
    pub output_file: PathBuf,

    #[command(flatten)]
    pub force: ForceArg,
}

#[derive(clap::Args, Debug)]
pub struct ModifyArgs {
    pub state_file: PathBuf,
    /// Resource address, with an index key for count/for_each resources
    pub address: String,
    /// Dot-separated attribute path, e.g. tags.Environment
    pub attribute: String,
    /// New value; parsed as JSON when possible, otherwise taken as a string
    #[arg(allow_hyphen_values = true)]
    pub value: String,

    #[command(flatten)]
    pub force: ForceArg,
}

#[derive(clap::Args, Debug)]
pub struct MoveArgs {
    pub state_file: PathBuf,
    pub old_address: String,
    pub new_address: String,

    #[command(flatten)]
    pub force: ForceArg,
}

#[derive(clap::Args, Debug)]
pub struct DeleteArgs {
    pub state_file: PathBuf,
    pub address: String,

    #[command(flatten)]
    pub force: ForceArg,
}

#[derive(clap::Args, Debug)]
pub struct ValidateArgs {
    pub state_file: PathBuf,
}

#[derive(clap::Args, Debug)]
pub struct FindArgs {
    #[arg(default_value = ".")]
    pub directory: PathBuf,
}

#[derive(clap::Args, Debug)]
pub struct BackupsArgs {
    pub state_file: PathBuf,
}

#[derive(clap::Args, Debug)]
pub struct RollbackArgs {
    pub state_file: PathBuf,
    pub backup_file: PathBuf,

    #[command(flatten)]
    pub force: ForceArg,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use serial_test::serial;

    fn with_env<T>(key: &str, value: Option<&str>, f: impl FnOnce() -> T) -> T {
        let backup = std::env::var(key).ok();
        unsafe {
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
        }
        let result = f();
        unsafe {
            match backup {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
        }
        result
    }

    #[test]
    fn test_list_args_filters() {
        let cli = Cli::parse_from([
            "tfstate-tool",
            "list",
            "terraform.tfstate",
            "--type",
            "aws_instance",
            "--name",
            "web*",
            "--format",
            "table",
        ]);

        if let Command::List(args) = cli.command {
            assert_eq!(args.state_file, PathBuf::from("terraform.tfstate"));
            assert_eq!(args.resource_type.as_deref(), Some("aws_instance"));
            assert_eq!(args.name.as_deref(), Some("web*"));
            assert_eq!(args.format, ListFormat::Table);
        } else {
            panic!("Expected List command, got {:?}", cli.command);
        }
    }

    #[test]
    fn test_modify_args_accept_negative_value() {
        let cli = Cli::parse_from([
            "tfstate-tool",
            "modify",
            "terraform.tfstate",
            "aws_instance.web",
            "cpu_credits",
            "-1",
        ]);

        if let Command::Modify(args) = cli.command {
            assert_eq!(args.address, "aws_instance.web");
            assert_eq!(args.attribute, "cpu_credits");
            assert_eq!(args.value, "-1");
        } else {
            panic!("Expected Modify command, got {:?}", cli.command);
        }
    }

    #[test]
    fn test_find_defaults_to_current_dir() {
        let cli = Cli::parse_from(["tfstate-tool", "find"]);
        if let Command::Find(args) = cli.command {
            assert_eq!(args.directory, PathBuf::from("."));
        } else {
            panic!("Expected Find command, got {:?}", cli.command);
        }
    }

    #[test]
    fn test_verbose_is_global() {
        let cli = Cli::parse_from(["tfstate-tool", "validate", "a.tfstate", "-v"]);
        assert!(cli.verbose);
    }

    #[test]
    #[serial]
    fn test_force_defaults_off() {
        let cli = with_env("TFSTATE_TOOL_FORCE", None, || {
            Cli::parse_from(["tfstate-tool", "delete", "a.tfstate", "aws_instance.web"])
        });
        assert!(!cli.command.force());
    }

    #[test]
    #[serial]
    fn test_force_from_flag() {
        let cli = with_env("TFSTATE_TOOL_FORCE", None, || {
            Cli::parse_from([
                "tfstate-tool",
                "delete",
                "a.tfstate",
                "aws_instance.web",
                "--force",
            ])
        });
        assert!(cli.command.force());
    }

    #[test]
    #[serial]
    fn test_force_from_env_var_fallback() {
        let cli = with_env("TFSTATE_TOOL_FORCE", Some("true"), || {
            Cli::parse_from(["tfstate-tool", "move", "a.tfstate", "a.b", "a.c"])
        });
        assert!(cli.command.force());

        let cli = with_env("TFSTATE_TOOL_FORCE", Some("false"), || {
            Cli::parse_from(["tfstate-tool", "move", "a.tfstate", "a.b", "a.c"])
        });
        assert!(!cli.command.force());
    }

    #[test]
    #[serial]
    fn test_format_from_env_var_fallback() {
        let cli = with_env("TFSTATE_TOOL_FORMAT", Some("table"), || {
            Cli::parse_from(["tfstate-tool", "list", "a.tfstate"])
        });
        if let Command::List(args) = cli.command {
            assert_eq!(args.format, ListFormat::Table);
        } else {
            panic!("Expected List command, got {:?}", cli.command);
        }
    }

    #[test]
    #[serial]
    fn test_format_cli_flag_takes_precedence_over_env() {
        let cli = with_env("TFSTATE_TOOL_FORMAT", Some("table"), || {
            Cli::parse_from(["tfstate-tool", "list", "a.tfstate", "--format=tree"])
        });
        if let Command::List(args) = cli.command {
            assert_eq!(args.format, ListFormat::Tree);
        } else {
            panic!("Expected List command, got {:?}", cli.command);
        }
    }

    #[test]
    fn test_list_is_never_forced() {
        let cli = Cli::parse_from(["tfstate-tool", "list", "a.tfstate"]);
        assert!(!cli.command.force());
    }
}
