use std::io::{self, BufRead, Write};

use anyhow::{Result, bail};
use clap::Args;
use client::{
    GatewayError, Session, SessionPhase, SessionStorage,
    validation::{validate_login, validate_registration},
};
use rpassword::prompt_password;
use shared::models::{LoginRequest, RegisterData, RegisterRequest, User};

use super::Context;

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Account email; prompted for when omitted
    #[arg(long, short)]
    pub email: Option<String>,

    /// Read the password from the first line of stdin instead of prompting
    #[arg(long)]
    pub password_stdin: bool,

    /// Ask the server for a long-lived session
    #[arg(long)]
    pub remember_me: bool,
}

#[derive(Args, Debug)]
pub struct RegisterArgs {
    #[arg(long, short)]
    pub email: Option<String>,

    #[arg(long, short)]
    pub nickname: Option<String>,

    /// Invite code issued by the marketplace
    #[arg(long, requires = "verification_code")]
    pub invite_code: Option<String>,

    /// Code emailed by `junjian send-code`
    #[arg(long, requires = "invite_code")]
    pub verification_code: Option<String>,

    /// Read the password from the first line of stdin instead of prompting
    #[arg(long)]
    pub password_stdin: bool,
}

pub async fn login(context: &Context, args: LoginArgs) -> Result<()> {
    let email = match args.email {
        Some(email) => email,
        None => prompt("Email: ")?,
    };
    let password = read_password(args.password_stdin, "Password: ")?;

    let request = LoginRequest {
        email,
        password,
        remember_me: args.remember_me,
    };
    validate_login(&request)?;

    context
        .store
        .login(&request.email, &request.password, request.remember_me)
        .await?;
    print_session(&context.store.get(), context);
    Ok(())
}

pub async fn register(context: &Context, args: RegisterArgs) -> Result<()> {
    let email = match args.email {
        Some(email) => email,
        None => prompt("Email: ")?,
    };
    let nickname = match args.nickname {
        Some(nickname) => nickname,
        None => prompt("Nickname: ")?,
    };
    let (password, confirm_password) = if args.password_stdin {
        let password = read_stdin_line()?;
        (password.clone(), password)
    } else {
        (
            prompt_password("Password: ")?,
            prompt_password("Confirm password: ")?,
        )
    };

    let form = RegisterData {
        email,
        password,
        confirm_password,
        nickname,
    };
    validate_registration(&form)?;

    let request = match (args.invite_code, args.verification_code) {
        (Some(invite), Some(code)) => RegisterRequest::invited(form, invite, code),
        _ => RegisterRequest::from(form),
    };
    context.store.register(request).await?;
    print_session(&context.store.get(), context);
    Ok(())
}

pub fn logout(context: &Context) {
    let was_authenticated = context.store.get().is_authenticated;
    context.store.logout();
    if was_authenticated {
        println!("Logged out.");
    } else {
        println!("No active session.");
    }
    println!("session record: {}", context.storage.path().display());
}

pub fn status(context: &Context) {
    let session = context.store.get();
    match session.phase() {
        SessionPhase::Authenticated => print_session(&session, context),
        SessionPhase::Anonymous | SessionPhase::Authenticating => {
            println!("Not logged in. Run `junjian login` to sign in.");
        }
    }
}

pub async fn whoami(context: &Context) -> Result<()> {
    if !context.store.check_auth() {
        bail!("no active session found; run `junjian login` first");
    }
    match context.store.refresh_user().await {
        Ok(user) => {
            print_user(&user);
            Ok(())
        }
        Err(GatewayError::SessionExpired { .. }) => {
            bail!("session expired. run `junjian login` to sign in again")
        }
        Err(err) => Err(err.into()),
    }
}

fn print_session(session: &Session, context: &Context) {
    match &session.user {
        Some(user) => print_user(user),
        None => println!("Not logged in."),
    }
    if context.storage.load().ok().flatten().is_some() {
        println!("session stored at {}", context.storage.path().display());
    }
}

fn print_user(user: &User) {
    println!("Logged in as {} ({})", user.email, user.nickname);
    println!("id: {}", user.id);
    println!("role: {}", user.role);
    println!("status: {}", user.status);
    println!(
        "email verified: {}",
        if user.email_verified { "yes" } else { "no" }
    );
}

fn prompt(message: &str) -> Result<String> {
    print!("{message}");
    io::stdout().flush().ok();
    let input = read_stdin_line()?.trim().to_string();
    if input.is_empty() {
        bail!("input must not be empty");
    }
    Ok(input)
}

fn read_password(from_stdin: bool, message: &str) -> Result<String> {
    let password = if from_stdin {
        read_stdin_line()?
    } else {
        prompt_password(message)?
    };
    if password.is_empty() {
        bail!("password must not be empty");
    }
    Ok(password)
}

fn read_stdin_line() -> Result<String> {
    let mut input = String::new();
    io::stdin().lock().read_line(&mut input)?;
    Ok(input.trim_end_matches(['\r', '\n']).to_string())
}
