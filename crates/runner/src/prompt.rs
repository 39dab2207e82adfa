//! System prompt assembly (ground: `runner.py::load_system_prompt`,
//! generalized per SPEC_FULL.md with an environment snapshot section).

use std::path::Path;
use std::process::Command;

const DEFAULT_SYSTEM_PROMPT: &str = "# Autofram Agent\n\nNo SYSTEM.md found.\n";
const DEFAULT_COMMS: &str = "No COMMS.md found.\n";

/// Run `pwd`, `git branch --show-current`, and `find . -type f` against
/// `working_dir` and render their output as a single snapshot block —
/// the same environment-awareness the original gets implicitly from
/// shelling out for its startup banner line.
pub fn environment_snapshot(working_dir: &Path) -> String {
    let pwd = working_dir.display().to_string();
    let branch = af_git::current_branch(working_dir);
    let files = run_capture(&["find", ".", "-type", "f"], working_dir);

    format!(
        "pwd: {pwd}\nbranch: {branch}\nfiles:\n{files}"
    )
}

fn run_capture(args: &[&str], cwd: &Path) -> String {
    let Some((program, rest)) = args.split_first() else {
        return String::new();
    };
    match Command::new(program).args(rest).current_dir(cwd).output() {
        Ok(output) => String::from_utf8_lossy(&output.stdout).trim_end().to_string(),
        Err(_) => String::new(),
    }
}

/// Build the full system prompt for one cycle: `SYSTEM.md` + environment
/// snapshot + `COMMS.md`, `\n\n---\n\n`-delimited (spec §4.1 step 4).
pub fn build_system_prompt(working_dir: &Path) -> String {
    let system_content = af_fs::load_file_content(
        &working_dir.join("static/prompts/SYSTEM.md"),
        DEFAULT_SYSTEM_PROMPT,
    );
    let comms_content =
        af_fs::load_file_content(&working_dir.join("COMMS.md"), DEFAULT_COMMS);
    let snapshot = environment_snapshot(working_dir);

    format!(
        "{}\n\n---\n\n# Environment\n\n{snapshot}\n\n---\n\n# COMMS.md\n\n{comms_content}",
        system_content.trim_end()
    )
}
