use super::*;

fn lead(id: &str) -> Lead {
    serde_json::from_value(serde_json::json!({ "id": id, "name": format!("Company {id}") })).unwrap()
}

#[test]
fn selection_maps_positions_to_ids() {
    let leads = vec![lead("a"), lead("b"), lead("c")];
    assert_eq!(resolve_selection(&leads, &[3, 1]).unwrap(), vec!["c", "a"]);
    assert_eq!(resolve_selection(&leads, &[2, 2]).unwrap(), vec!["b"]);
    assert!(resolve_selection(&leads, &[]).unwrap().is_empty());
}

#[test]
fn selection_rejects_out_of_range_positions() {
    let leads = vec![lead("a")];
    assert!(matches!(resolve_selection(&leads, &[0]), Err(CliError::NoSuchLead { index: 0, available: 1 })));
    assert!(matches!(resolve_selection(&leads, &[2]), Err(CliError::NoSuchLead { index: 2, .. })));
}

#[test]
fn status_parses_wire_labels() {
    assert_eq!(parse_status("research-complete").unwrap(), CampaignStatus::ResearchComplete);
    assert_eq!(parse_status(" completed ").unwrap(), CampaignStatus::Completed);
    assert!(matches!(parse_status("done"), Err(CliError::InvalidStatus(_))));
}

#[test]
fn cli_parses_run_with_selection() {
    let cli = Cli::try_parse_from([
        "smartreach-cli",
        "--base-url",
        "http://backend:8000/api",
        "run",
        "--product",
        "Cloud Migration",
        "--area",
        "Austin",
        "--max-leads",
        "5",
        "--select",
        "1,2",
        "--approve",
    ])
    .unwrap();

    assert_eq!(cli.base_url.as_deref(), Some("http://backend:8000/api"));
    let Command::Run(args) = cli.command else {
        panic!("expected run command");
    };
    assert_eq!(args.product, "Cloud Migration");
    assert_eq!(parse_max_leads(&args.max_leads), 5);
    assert_eq!(args.selection.select, vec![1, 2]);
    assert!(args.selection.approve);
    assert!(!args.selection.all);
}

#[test]
fn cli_rejects_select_with_all() {
    let parsed = Cli::try_parse_from(["smartreach-cli", "resume", "camp-1", "--all", "--select", "1"]);
    assert!(parsed.is_err());
}

#[test]
fn command_names_match_subcommands() {
    for (argv, expected) in [
        (vec!["smartreach-cli", "dashboard"], "dashboard"),
        (vec!["smartreach-cli", "history", "list"], "history"),
        (vec!["smartreach-cli", "profile", "show"], "profile"),
        (vec!["smartreach-cli", "resume", "camp-1"], "resume"),
        (vec!["smartreach-cli", "run", "--product", "CRM", "--area", "Austin"], "run"),
    ] {
        let cli = Cli::try_parse_from(argv).unwrap();
        assert_eq!(cli.command.name(), expected);
    }
}
