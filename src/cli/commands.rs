use std::fmt::Display;
use std::io::Write;
use std::path::Path;

use walkdir::WalkDir;

use super::args::{
    BackupsArgs, Command, DeleteArgs, ExportArgs, FindArgs, ListArgs, ListFormat, ModifyArgs,
    MoveArgs, RollbackArgs, ValidateArgs,
};
use crate::backup::{BackupHandle, BackupManager};
use crate::confirm::{self, ConfirmationPolicy};
use crate::error::TfstateError;
use crate::mutator::{self, Mutation, Outcome};
use crate::output;
use crate::state_file::{StateFile, write_atomic};
use crate::terraform::{Address, AttributePath, ResourceFilter, StateDocument, parse_value};

/// Runs one subcommand, writing its human-readable report to `out`.
pub fn run(
    command: Command,
    policy: &dyn ConfirmationPolicy,
    out: &mut dyn Write,
) -> Result<(), TfstateError> {
    match command {
        Command::List(args) => list(args, out),
        Command::Export(args) => export(args, policy, out),
        Command::Modify(args) => modify(args, policy, out),
        Command::Move(args) => move_resource(args, policy, out),
        Command::Delete(args) => delete(args, policy, out),
        Command::Validate(args) => validate(args, out),
        Command::Find(args) => find(args, out),
        Command::Backups(args) => backups(args, out),
        Command::Rollback(args) => rollback(args, policy, out),
    }
}

fn say(out: &mut dyn Write, text: impl Display) -> Result<(), TfstateError> {
    writeln!(out, "{text}").map_err(|e| TfstateError::io("<stdout>", e))
}

fn list(args: ListArgs, out: &mut dyn Write) -> Result<(), TfstateError> {
    let file = StateFile::open(&args.state_file)?;
    let filter = ResourceFilter::new(args.resource_type.as_deref(), args.name.as_deref())?;
    let resources = filter.apply(file.document());

    if resources.is_empty() {
        return say(out, "No resources found matching criteria");
    }

    match args.format {
        ListFormat::Tree => {
            let title = args.state_file.display().to_string();
            say(out, output::resource_tree(&title, &resources))?;
        }
        ListFormat::Table => say(out, output::resource_table(&resources))?,
    }
    say(
        out,
        format!("Total: {} of {} resources", resources.len(), file.document().resources.len()),
    )
}

fn export(
    args: ExportArgs,
    policy: &dyn ConfirmationPolicy,
    out: &mut dyn Write,
) -> Result<(), TfstateError> {
    let file = StateFile::open(&args.state_file)?;
    let address: Address = args.address.parse()?;
    address.require_whole_resource("export")?;
    let location = file
        .index()
        .find(&address)
        .ok_or_else(|| TfstateError::NotFound(address.to_string()))?;
    let resource = &file.document().resources[location.position];

    if args.output_file.exists() {
        confirm::require(
            policy,
            &format!("{} exists. Overwrite?", args.output_file.display()),
        )?;
    }

    let mut bytes =
        serde_json::to_vec_pretty(resource).map_err(|e| TfstateError::Format(e.to_string()))?;
    bytes.push(b'\n');
    write_atomic(&args.output_file, &bytes)?;

    say(
        out,
        format!("Exported {address} to {}", args.output_file.display()),
    )
}

fn modify(
    args: ModifyArgs,
    policy: &dyn ConfirmationPolicy,
    out: &mut dyn Write,
) -> Result<(), TfstateError> {
    let path: AttributePath = args.attribute.parse()?;
    let mutation = Mutation::Modify {
        address: args.address.parse()?,
        path,
        value: parse_value(&args.value),
    };
    apply_mutation(&args.state_file, &mutation, policy, out)
}

fn move_resource(
    args: MoveArgs,
    policy: &dyn ConfirmationPolicy,
    out: &mut dyn Write,
) -> Result<(), TfstateError> {
    let mutation = Mutation::Move {
        from: args.old_address.parse()?,
        to: args.new_address.parse()?,
    };
    apply_mutation(&args.state_file, &mutation, policy, out)
}

fn delete(
    args: DeleteArgs,
    policy: &dyn ConfirmationPolicy,
    out: &mut dyn Write,
) -> Result<(), TfstateError> {
    let mutation = Mutation::Delete {
        address: args.address.parse()?,
    };
    apply_mutation(&args.state_file, &mutation, policy, out)
}

// Dry-runs the mutation first so that nothing is asked, snapshotted or
// written when it cannot succeed.
fn apply_mutation(
    state_file: &Path,
    mutation: &Mutation,
    policy: &dyn ConfirmationPolicy,
    out: &mut dyn Write,
) -> Result<(), TfstateError> {
    let mut file = StateFile::open(state_file)?;
    mutator::check(file.document(), mutation)?;

    say(out, format!("About to {}", mutation.describe()))?;
    confirm::require(policy, "Continue?")?;

    let applied = file.apply(mutation, &BackupManager::new())?;
    say(
        out,
        format!("Backup created: {}", applied.backup.backup_path().display()),
    )?;

    let summary = match &applied.outcome {
        Outcome::Modified {
            address,
            path,
            previous,
        } => match previous {
            Some(old) => format!("Modified {address}: {path} {old} -> {}", new_value(mutation)),
            None => format!("Modified {address}: {path} set to {}", new_value(mutation)),
        },
        Outcome::Deleted { address, instances } => {
            format!("Deleted {address} ({instances} instance(s)) from state")
        }
        Outcome::Moved {
            from,
            to,
            instances,
        } => format!("Moved {from} to {to} ({instances} instance(s))"),
    };
    say(out, summary)?;
    say(out, format!("Serial is now {}", file.document().serial()))
}

fn new_value(mutation: &Mutation) -> String {
    match mutation {
        Mutation::Modify { value, .. } => value.to_string(),
        _ => String::new(),
    }
}

fn validate(args: ValidateArgs, out: &mut dyn Write) -> Result<(), TfstateError> {
    let file = StateFile::read(&args.state_file)?;
    let doc = file.document();
    describe_document(doc, out)?;

    let problems = doc.violations();
    if problems.is_empty() {
        return say(out, "State file is valid");
    }
    say(out, "State file has validation errors:")?;
    for problem in &problems {
        say(out, format!("  - {problem}"))?;
    }
    Err(TfstateError::Validation(problems))
}

fn describe_document(doc: &StateDocument, out: &mut dyn Write) -> Result<(), TfstateError> {
    say(out, format!("version:           {}", doc.version()))?;
    say(
        out,
        format!(
            "terraform_version: {}",
            doc.terraform_version().unwrap_or("(unset)")
        ),
    )?;
    say(out, format!("serial:            {}", doc.serial()))?;
    say(
        out,
        format!("lineage:           {}", doc.lineage().unwrap_or("(unset)")),
    )?;
    say(out, format!("resources:         {}", doc.resources.len()))
}

fn find(args: FindArgs, out: &mut dyn Write) -> Result<(), TfstateError> {
    let mut found = Vec::new();
    for entry in WalkDir::new(&args.directory).follow_links(false) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(args.directory.as_path()).to_path_buf();
            TfstateError::io(path, e.into())
        })?;
        let is_state = entry.file_type().is_file()
            && entry.path().extension().is_some_and(|ext| ext == "tfstate");
        if is_state {
            found.push(entry.into_path());
        }
    }
    found.sort();

    if found.is_empty() {
        return Err(TfstateError::NotFound(format!(
            "no .tfstate files under {}",
            args.directory.display()
        )));
    }

    say(out, format!("Found {} state file(s):", found.len()))?;
    for path in &found {
        say(out, format!("  {}", path.display()))?;
    }
    Ok(())
}

fn backups(args: BackupsArgs, out: &mut dyn Write) -> Result<(), TfstateError> {
    let found = BackupManager::new().list(&args.state_file)?;
    if found.is_empty() {
        return say(
            out,
            format!("No backups found for {}", args.state_file.display()),
        );
    }
    for path in &found {
        say(out, path.display())?;
    }
    Ok(())
}

fn rollback(
    args: RollbackArgs,
    policy: &dyn ConfirmationPolicy,
    out: &mut dyn Write,
) -> Result<(), TfstateError> {
    let handle = BackupHandle::open(&args.state_file, &args.backup_file)?;
    confirm::require(
        policy,
        &format!(
            "Replace {} with {}?",
            args.state_file.display(),
            args.backup_file.display()
        ),
    )?;

    let manager = BackupManager::new();
    if args.state_file.exists() {
        let current = manager.snapshot(&args.state_file)?;
        say(
            out,
            format!("Backup created: {}", current.backup_path().display()),
        )?;
    }
    manager.rollback(&handle)?;
    say(
        out,
        format!(
            "Restored {} from {}",
            handle.original().display(),
            handle.backup_path().display()
        ),
    )
}
