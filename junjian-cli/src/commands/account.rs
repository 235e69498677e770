use anyhow::Result;
use clap::Args;
use shared::models::VerificationKind;

use super::Context;

#[derive(Args, Debug)]
pub struct SendCodeArgs {
    #[arg(long, short)]
    pub email: String,

    /// Purpose of the code: `register` or `reset-password`
    #[arg(long, short, default_value = "register")]
    pub kind: VerificationKind,
}

#[derive(Args, Debug)]
pub struct ValidateInviteArgs {
    #[arg(long)]
    pub code: String,
}

#[derive(Args, Debug)]
pub struct VerifyCodeArgs {
    #[arg(long, short)]
    pub email: String,

    #[arg(long)]
    pub code: String,

    #[arg(long, short, default_value = "register")]
    pub kind: VerificationKind,
}

pub async fn send_code(context: &Context, args: SendCodeArgs) -> Result<()> {
    let response = context
        .gateway
        .send_verification_code(&args.email, args.kind)
        .await?;
    println!("{}", response.message);
    Ok(())
}

pub async fn validate_invite(context: &Context, args: ValidateInviteArgs) -> Result<()> {
    let validation = context.gateway.validate_invite_code(&args.code).await?;
    if validation.valid {
        match validation.role {
            Some(role) => println!("invite code is valid for role {role}"),
            None => println!("invite code is valid"),
        }
    } else {
        println!("invite code is not valid");
    }
    if let Some(message) = validation.message {
        println!("server: {message}");
    }
    Ok(())
}

pub async fn verify_code(context: &Context, args: VerifyCodeArgs) -> Result<()> {
    let validation = context
        .gateway
        .validate_verification_code(&args.email, &args.code, args.kind)
        .await?;
    println!(
        "verification code is {}",
        if validation.valid { "correct" } else { "incorrect or expired" }
    );
    if let Some(message) = validation.message {
        println!("server: {message}");
    }
    Ok(())
}

pub async fn health(context: &Context) -> Result<()> {
    let health = context.gateway.health().await?;
    match health.service {
        Some(service) => println!("{}: {}", service, health.status),
        None => println!("{}", health.status),
    }
    Ok(())
}
