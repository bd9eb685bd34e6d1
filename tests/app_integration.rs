use bcbmon::AppCommand;
use bcbmon::cli::dashboard::DashboardOptions;
use bcbmon::cli::simulate::SimulateOptions;
use bcbmon::core::rates::IndexerKind;
use chrono::NaiveDate;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

mod test_utils {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub async fn mount_series(mock_server: &MockServer, code: u32, mock_response: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/dados/serie/bcdata.sgs.{code}/dados")))
            .respond_with(ResponseTemplate::new(200).set_body_string(mock_response))
            .mount(mock_server)
            .await;
    }

    pub async fn mount_focus(mock_server: &MockServer, endpoint: &str, median: f64) {
        Mock::given(method("GET"))
            .and(path(format!(
                "/olinda/servico/Expectativas/versao/v1/odata/{endpoint}"
            )))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                r#"{{"value": [{{"Indicador": "x", "Data": "2024-06-07", "Mediana": {median}}}]}}"#
            )))
            .mount(mock_server)
            .await;
    }

    /// Builds an SGS JSON body with one observation per month of 2024 up to June.
    pub fn monthly_body(values: &[f64]) -> String {
        let rows: Vec<String> = values
            .iter()
            .enumerate()
            .map(|(i, v)| format!(r#"{{"data": "01/{:02}/2024", "valor": "{v}"}}"#, i + 1))
            .collect();
        format!("[{}]", rows.join(","))
    }

    pub async fn request_count(mock_server: &MockServer) -> usize {
        mock_server.received_requests().await.unwrap().len()
    }

    pub async fn failing_server() -> MockServer {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("Server Error"))
            .mount(&mock_server)
            .await;
        mock_server
    }
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 10).unwrap()
}

fn write_config(dir: &TempDir, base_url: &str) -> String {
    let config_path = dir.path().join("config.yaml");
    let config_content = format!(
        r#"
        providers:
          sgs:
            base_url: {base_url}
            timeout_secs: 5
          focus:
            base_url: {base_url}
        fetch:
          attempts: 2
          retry_delay_ms: 1
        data_path: {}
    "#,
        dir.path().join("data").display()
    );
    fs::write(&config_path, config_content).expect("Failed to write config file");
    config_path.to_str().unwrap().to_string()
}

fn write_snapshot(dir: &Path) {
    let data_dir = dir.join("data");
    fs::create_dir_all(&data_dir).unwrap();
    fs::write(
        data_dir.join("market_data_cache.csv"),
        "data,Selic,IPCA\n2024-01-01,11.75,4.51\n2024-02-01,11.25,4.5\n",
    )
    .unwrap();
}

#[test_log::test(tokio::test)]
async fn test_dashboard_with_mock_writes_snapshot() {
    let mock_server = wiremock::MockServer::start().await;
    test_utils::mount_series(
        &mock_server,
        432,
        &test_utils::monthly_body(&[11.75, 11.25, 10.75, 10.75, 10.5, 10.5]),
    )
    .await;
    test_utils::mount_series(
        &mock_server,
        13522,
        &test_utils::monthly_body(&[4.51, 4.5, 3.93, 3.69, 3.93, 4.23]),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let config_path = write_config(&dir, &mock_server.uri());

    let result = bcbmon::run_command_on(
        AppCommand::Dashboard(DashboardOptions {
            page: 1,
            ..Default::default()
        }),
        Some(&config_path),
        today(),
    )
    .await;
    assert!(result.is_ok(), "Dashboard failed with: {:?}", result.err());

    let snapshot = fs::read_to_string(dir.path().join("data").join("market_data_cache.csv"))
        .expect("Snapshot should be written after a live fetch");
    assert!(snapshot.starts_with("data,Selic,IPCA\n"));
    assert!(snapshot.contains("2024-06-01,10.5,4.23"));

    let history = bcbmon::run_command_on(
        AppCommand::History {
            start: NaiveDate::from_ymd_opt(2024, 3, 1),
            end: None,
        },
        Some(&config_path),
        today(),
    )
    .await;
    assert!(history.is_ok(), "History failed with: {:?}", history.err());
}

#[test_log::test(tokio::test)]
async fn test_dashboard_falls_back_to_snapshot() {
    let mock_server = test_utils::failing_server().await;
    let dir = TempDir::new().unwrap();
    let config_path = write_config(&dir, &mock_server.uri());
    write_snapshot(dir.path());

    let result = bcbmon::run_command_on(
        AppCommand::Dashboard(DashboardOptions::default()),
        Some(&config_path),
        today(),
    )
    .await;
    assert!(result.is_ok(), "Dashboard failed with: {:?}", result.err());
}

#[test_log::test(tokio::test)]
async fn test_dashboard_without_data_fails() {
    let mock_server = test_utils::failing_server().await;
    let dir = TempDir::new().unwrap();
    let config_path = write_config(&dir, &mock_server.uri());

    let result = bcbmon::run_command_on(
        AppCommand::Dashboard(DashboardOptions::default()),
        Some(&config_path),
        today(),
    )
    .await;
    let error = result.expect_err("Dashboard should fail without any data");
    assert!(
        error
            .to_string()
            .starts_with("Could not retrieve data from Banco Central")
    );
}

#[test_log::test(tokio::test)]
async fn test_indicators_with_mock() {
    let mock_server = wiremock::MockServer::start().await;
    test_utils::mount_series(&mock_server, 432, &test_utils::monthly_body(&[10.5; 6])).await;
    test_utils::mount_series(&mock_server, 13522, &test_utils::monthly_body(&[4.0; 6])).await;
    test_utils::mount_series(
        &mock_server,
        1,
        &test_utils::monthly_body(&[5.0, 5.1, 5.2, 5.3, 5.4, 5.5]),
    )
    .await;

    // IGP-M needs twelve monthly prints to accumulate a year
    let igpm_rows: Vec<String> = (0..18)
        .map(|i| {
            let date = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap() + chrono::Months::new(i);
            format!(r#"{{"data": "{}", "valor": "1.0"}}"#, date.format("%d/%m/%Y"))
        })
        .collect();
    test_utils::mount_series(&mock_server, 189, &format!("[{}]", igpm_rows.join(","))).await;

    test_utils::mount_focus(&mock_server, "ExpectativasMercadoInflacao12Meses", 3.96).await;
    test_utils::mount_focus(&mock_server, "ExpectativasMercadoAnuais", 2.05).await;

    let dir = TempDir::new().unwrap();
    let config_path = write_config(&dir, &mock_server.uri());

    let result =
        bcbmon::run_command_on(AppCommand::Indicators, Some(&config_path), today()).await;
    assert!(result.is_ok(), "Indicators failed with: {:?}", result.err());
    assert!(dir.path().join("data").join("indicators_cache.csv").exists());
}

#[test_log::test(tokio::test)]
async fn test_simulate_prefixed_needs_no_network() {
    let mock_server = test_utils::failing_server().await;
    let dir = TempDir::new().unwrap();
    let config_path = write_config(&dir, &mock_server.uri());

    let result = bcbmon::run_command_on(
        AppCommand::Simulate(SimulateOptions {
            indexer: IndexerKind::Prefixed,
            rate: Some(12.0),
            ..Default::default()
        }),
        Some(&config_path),
        today(),
    )
    .await;
    assert!(result.is_ok(), "Simulate failed with: {:?}", result.err());
    assert!(mock_server.received_requests().await.unwrap().is_empty());
}

#[test_log::test(tokio::test)]
async fn test_simulate_cdi_uses_fallback_selic() {
    let mock_server = test_utils::failing_server().await;
    let dir = TempDir::new().unwrap();
    let config_path = write_config(&dir, &mock_server.uri());

    let result = bcbmon::run_command_on(
        AppCommand::Simulate(SimulateOptions::default()),
        Some(&config_path),
        today(),
    )
    .await;
    assert!(result.is_ok(), "Simulate failed with: {:?}", result.err());
}

#[test_log::test(tokio::test)]
async fn test_simulate_rejects_negative_deposit() {
    let dir = TempDir::new().unwrap();
    let config_path = write_config(&dir, "http://127.0.0.1:9");

    let result = bcbmon::run_command_on(
        AppCommand::Simulate(SimulateOptions {
            monthly: -10.0,
            indexer: IndexerKind::Prefixed,
            ..Default::default()
        }),
        Some(&config_path),
        today(),
    )
    .await;
    assert!(result.is_err());
}

#[test_log::test(tokio::test)]
async fn test_clear_cache_forces_refetch() {
    let mock_server = wiremock::MockServer::start().await;
    test_utils::mount_series(&mock_server, 432, &test_utils::monthly_body(&[10.5; 6])).await;
    test_utils::mount_series(&mock_server, 13522, &test_utils::monthly_body(&[4.0; 6])).await;

    let dir = TempDir::new().unwrap();
    let config_path = write_config(&dir, &mock_server.uri());
    let dashboard = || {
        bcbmon::run_command_on(
            AppCommand::Dashboard(DashboardOptions::default()),
            Some(&config_path),
            today(),
        )
    };

    assert!(dashboard().await.is_ok());
    assert_eq!(test_utils::request_count(&mock_server).await, 2);

    // Cached responses survive between runs
    assert!(dashboard().await.is_ok());
    assert_eq!(test_utils::request_count(&mock_server).await, 2);

    assert!(
        bcbmon::run_command_on(AppCommand::ClearCache, Some(&config_path), today())
            .await
            .is_ok()
    );
    assert!(dashboard().await.is_ok());
    assert_eq!(test_utils::request_count(&mock_server).await, 4);
}

#[test_log::test(tokio::test)]
async fn test_simulate_rejects_negative_rate() {
    let dir = TempDir::new().unwrap();
    let config_path = write_config(&dir, "http://127.0.0.1:9");

    let result = bcbmon::run_command_on(
        AppCommand::Simulate(SimulateOptions {
            indexer: IndexerKind::Prefixed,
            rate: Some(-1.0),
            ..Default::default()
        }),
        Some(&config_path),
        today(),
    )
    .await;
    assert!(result.is_err());
}

#[test_log::test(tokio::test)]
async fn test_glossary_and_clear_cache() {
    let dir = TempDir::new().unwrap();
    let config_path = write_config(&dir, "http://127.0.0.1:9");

    assert!(
        bcbmon::run_command_on(AppCommand::Glossary, Some(&config_path), today())
            .await
            .is_ok()
    );
    assert!(
        bcbmon::run_command_on(AppCommand::ClearCache, Some(&config_path), today())
            .await
            .is_ok()
    );
}

#[test_log::test(tokio::test)]
async fn test_missing_config_path_fails() {
    let result = bcbmon::run_command_on(
        AppCommand::Indicators,
        Some("/nonexistent/bcbmon/config.yaml"),
        today(),
    )
    .await;
    assert!(result.is_err());
}
