use std::io::{self, BufRead, Write};
use std::path::Path;

/// Decides whether setup may proceed in a directory that already has contents
pub trait Confirm {
    fn confirm(&self, dir: &Path, extra_entries: &[String]) -> bool;
}

impl<F: Fn(&Path, &[String]) -> bool> Confirm for F {
    fn confirm(&self, dir: &Path, extra_entries: &[String]) -> bool {
        self(dir, extra_entries)
    }
}

/// Lists the extra entries and asks on the terminal; only `y` proceeds
pub struct TerminalConfirm;

impl Confirm for TerminalConfirm {
    fn confirm(&self, dir: &Path, extra_entries: &[String]) -> bool {
        println!("The directory \"{}\" has contents other than the .glurmo directory.", dir.display());
        println!("Specifically, it contains the following files or directories:");
        for entry in extra_entries {
            println!("{}", entry);
        }
        print!("Proceeding with setup may overwrite some or all of these contents. Would you like to proceed anyway? (y/n): ");
        if io::stdout().flush().is_err() {
            return false;
        }

        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(_) => answer.trim() == "y",
            Err(_) => false,
        }
    }
}

/// Proceeds without asking (`--yes`)
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&self, _dir: &Path, _extra_entries: &[String]) -> bool {
        true
    }
}
