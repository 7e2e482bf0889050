use crate::context::AppContext;
use crate::format::{Formattable, OutputFormat};
use libimgsync::Config;

/// Implement Formattable for Config to enable output formatting
impl Formattable for Config {
    fn format_pretty(&self) -> String {
        let tls = if self.engine.ca_material.is_some() {
            "inline".to_string()
        } else if let Some(ref path) = self.engine.cert_path {
            format!("cert_path {}", path)
        } else {
            "none".to_string()
        };

        let mut output = format!(
            "[engine]\nhost = \"{}\"\ntls = {}\nstream_timeout = {}s\n",
            self.engine.host, tls, self.engine.stream_timeout
        );

        if let Some(ref forward) = self.engine.forward {
            output.push_str(&format!(
                "forward = {} -> {} via {}",
                forward.local_address, forward.remote_address, forward.end_host.address
            ));
            if let Some(ref bastion) = forward.bastion_host {
                output.push_str(&format!(" (bastion {})", bastion.address));
            }
            output.push('\n');
        }

        output.push_str(&format!(
            "\n[network]\ntimeout = {}s\nmax_idle_per_host = {}\n",
            self.network.timeout, self.network.max_idle_per_host
        ));

        if !self.registry_auth.is_empty() {
            output.push_str("\n[registry_auth]\n");
            for entry in &self.registry_auth {
                output.push_str(&format!("{} = \"{}\"\n", entry.address, entry.username));
            }
        }

        if !self.insecure_registries.is_empty() {
            output.push_str("\n[insecure_registries]\n");
            for host in &self.insecure_registries {
                output.push_str(&format!("{}\n", host));
            }
        }

        output
    }
}

/// Handle the config show subcommand; secrets are always masked
pub fn handle_show(ctx: &AppContext, format: OutputFormat) {
    super::print_formatted(ctx, &ctx.config.redacted(), format);
}

/// Handle the config validate subcommand
pub fn handle_validate(ctx: &AppContext) {
    match ctx.config.validate() {
        Ok(()) => ctx.formatter.success("Configuration is valid"),
        Err(e) => super::fail(ctx, &e),
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
