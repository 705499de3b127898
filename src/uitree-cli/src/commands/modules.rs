//! Modules command handler

use anyhow::{bail, Context, Result};
use uitree::source::find_process_by_name;
use uitree::{LiveProcess, MemorySource};

/// Handle the modules command
pub fn handle(pid: Option<u32>, process_name: Option<&str>) -> Result<()> {
    let pid = match (pid, process_name) {
        (Some(pid), _) => pid,
        (None, Some(name)) => find_process_by_name(name)
            .with_context(|| format!("Failed to find process '{}'", name))?,
        (None, None) => bail!("Give a process with --pid or --process-name"),
    };

    let process =
        LiveProcess::attach(pid).with_context(|| format!("Failed to attach to process {}", pid))?;
    let modules = process
        .enumerate_modules()
        .context("Failed to enumerate modules")?;

    println!("{} modules in {} (pid {}):", modules.len(), process.name, process.pid);
    for module in &modules {
        println!(
            "  {:#018x}  {:>10}  {}",
            module.base.get(),
            module.size,
            module.name
        );
    }

    Ok(())
}
