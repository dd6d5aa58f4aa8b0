use crate::cli::ConfigArgs;
use crate::config::{config_stub, default_config, write_config};
use anyhow::{anyhow, Result};

/// Print the default config, or write it when `--write` is given.
pub fn run_config(args: &ConfigArgs) -> Result<()> {
    let Some(path) = &args.write else {
        println!("{}", config_stub()?);
        return Ok(());
    };
    if path.is_file() && !args.force {
        return Err(anyhow!(
            "config already exists at {} (use --force to overwrite)",
            path.display()
        ));
    }
    write_config(path, &default_config())?;
    println!("wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
#[path = "init_tests.rs"]
mod tests;
