use clap::Args;
use serde_json::json;

use crate::cli::OutputFormat;
use crate::policy::{classify_route, decide, AccessDecision, Role};

#[derive(Args, Debug)]
pub struct PolicyArgs {
    #[arg(help = "Request path, e.g. /dashboard/admin/students")]
    pub path: String,

    #[arg(long, help = "Stored profile role (admin, instructor, student); anything else means no role")]
    pub role: Option<String>,

    #[arg(long, help = "Evaluate as a caller without a session")]
    pub anonymous: bool,
}

pub fn handle(args: PolicyArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let authenticated = !args.anonymous;
    let role = args.role.as_deref().and_then(Role::parse);
    let class = classify_route(&args.path);
    let decision = decide(authenticated, role, &args.path);
    let location = decision.location(&args.path);

    match output_format {
        OutputFormat::Json => {
            let response = json!({
                "path": args.path,
                "class": class.as_str(),
                "authenticated": authenticated,
                "role": role,
                "decision": if decision.is_allow() { "allow" } else { "redirect" },
                "location": location,
            });
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            let role = role.map(|r| r.as_str()).unwrap_or("none");
            let who = if authenticated { role } else { "anonymous" };
            match (decision, location) {
                (AccessDecision::Redirect { .. }, Some(location)) => {
                    println!("{} [{}] as {}: redirect to {}", args.path, class.as_str(), who, location)
                }
                _ => println!("{} [{}] as {}: allow", args.path, class.as_str(), who),
            }
        }
    }
    Ok(())
}
