use super::*;

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn defaults_are_valid() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.server.addr.port(), DEFAULT_PORT);
    assert_eq!(settings.auth.session_ttl, time::Duration::days(30));
    assert_eq!(settings.events.channel_capacity.get(), 256);
    assert!(settings.jobs.close_polls_enabled);
    assert!(settings.database.url.is_none());
}

#[test]
fn zero_rate_limit_is_rejected() {
    let mut raw = RawSettings::default();
    raw.rate_limit.max_requests = Some(0);

    let err = Settings::from_raw(raw).expect_err("zero ceiling must fail");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "rate_limit.max_requests",
            ..
        }
    ));
}

#[test]
fn session_ttl_is_bounded() {
    let mut raw = RawSettings::default();
    raw.auth.session_ttl_days = Some(MAX_SESSION_TTL_DAYS + 1);

    let err = Settings::from_raw(raw).expect_err("oversized ttl must fail");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "auth.session_ttl_days",
            ..
        }
    ));
}

#[test]
fn unparseable_host_is_rejected() {
    let mut raw = RawSettings::default();
    raw.server.host = Some("not a host".to_string());

    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid {
            key: "server.addr",
            ..
        })
    ));
}

#[test]
fn blank_database_url_is_treated_as_missing() {
    let mut raw = RawSettings::default();
    raw.database.url = Some("   ".to_string());

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.database.url.is_none());
}

#[test]
fn unparseable_log_level_is_rejected() {
    let mut raw = RawSettings::default();
    raw.logging.level = Some("chatty".to_string());

    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid {
            key: "logging.level",
            ..
        })
    ));
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn close_polls_worker_can_be_disabled() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        jobs_close_polls_enabled: Some(false),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(!settings.jobs.close_polls_enabled);
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["agora"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_close_polls_arguments() {
    let args = CliArgs::parse_from([
        "agora",
        "close-polls",
        "--database-url",
        "postgres://example",
    ]);

    match args.command.expect("close-polls command") {
        Command::ClosePolls(close) => {
            assert_eq!(
                close.database.database_url.as_deref(),
                Some("postgres://example")
            );
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_serve_overrides() {
    let args = CliArgs::parse_from([
        "agora",
        "serve",
        "--server-host",
        "0.0.0.0",
        "--database-url",
        "postgres://override",
        "--auth-session-ttl-days",
        "7",
    ]);

    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
            assert_eq!(
                serve.overrides.database_url.as_deref(),
                Some("postgres://override")
            );
            assert_eq!(serve.overrides.auth_session_ttl_days, Some(7));
        }
        _ => panic!("wrong command parsed"),
    }
}
