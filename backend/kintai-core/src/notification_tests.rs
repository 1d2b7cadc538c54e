// src/notification_tests.rs

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use reqwest::Client;
    use serde_json::Value;
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::runtime::Runtime;
    use tokio::task::JoinHandle;

    use super::super::config::{AppConfig, Manager};
    use super::super::notification::*;
    use super::super::shift_catalog::WorkMode;

    fn manager(name: &str, teams_id: &str) -> Manager {
        Manager {
            name: name.to_string(),
            teams_id: teams_id.to_string(),
        }
    }

    fn test_config() -> AppConfig {
        AppConfig {
            display_name: "山田太郎".into(),
            teams_user_id: "user-42".into(),
            managers: vec![
                manager("佐藤", "m-1"),
                manager("鈴木", ""),
                manager("高橋", "m-3"),
            ],
            ..AppConfig::default()
        }
    }

    /// The card fragments travel as JSON strings.
    fn fragment(payload: &Value, key: &str) -> Value {
        let raw = payload[key].as_str().expect("fragment is a string");
        serde_json::from_str(raw).unwrap()
    }

    fn clock_out_info(mention: &str, comment: &str) -> ClockOutInfo {
        ClockOutInfo {
            next_workday: NaiveDate::from_ymd_opt(2026, 2, 11),
            next_shift: "日勤".into(),
            next_work_mode: Some(WorkMode::Remote),
            mention: mention.into(),
            comment: comment.into(),
        }
    }

    // --- Payload ---

    #[test]
    fn test_clock_in_payload() {
        let payload = build_payload(
            &test_config(),
            &NotificationEvent::ClockIn {
                work_mode: WorkMode::Remote,
                comment: String::new(),
            },
        );

        assert_eq!(payload["userId"], "user-42");
        assert_eq!(payload["mention_data"], Value::Array(vec![]));
        assert_eq!(
            fragment(&payload, "column")["items"][0]["text"],
            "山田太郎が出勤しました"
        );
        assert_eq!(
            fragment(&payload, "message")["text"],
            "業務を開始します(リモート)"
        );
        assert_eq!(payload["comment"], "{}");
    }

    #[test]
    fn test_clock_in_comment_is_separated() {
        let payload = build_payload(
            &test_config(),
            &NotificationEvent::ClockIn {
                work_mode: WorkMode::Office,
                comment: "電車遅延".into(),
            },
        );
        let comment = fragment(&payload, "comment");
        assert_eq!(comment["text"], "コメント: 電車遅延");
        assert_eq!(comment["spacing"], "Small");
        assert_eq!(comment["separator"], true);
    }

    #[test]
    fn test_clock_out_mentions_all_managers() {
        let payload = build_payload(
            &test_config(),
            &NotificationEvent::ClockOut(clock_out_info(MENTION_ALL_MANAGERS, "")),
        );

        assert_eq!(payload["mention_data"], serde_json::json!(["m-1", "m-3"]));
        let comment = fragment(&payload, "comment");
        assert_eq!(comment["text"], "コメント: -");
        assert_eq!(comment["spacing"], "None");

        let message = fragment(&payload, "message");
        let items = message["items"].as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(
            items[0]["text"],
            "退勤します。次回は2月11日(水) リモート(日勤)です。"
        );
        assert_eq!(
            fragment(&payload, "column")["items"][0]["text"],
            "山田太郎が退勤しました"
        );
    }

    #[test]
    fn test_clock_out_comment_without_mention_goes_in_message() {
        let payload = build_payload(
            &test_config(),
            &NotificationEvent::ClockOut(clock_out_info("", "明日は午後から")),
        );

        assert_eq!(payload["mention_data"], Value::Array(vec![]));
        let message = fragment(&payload, "message");
        let items = message["items"].as_array().unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[2]["text"], "コメント: 明日は午後から");
    }

    #[test]
    fn test_clock_out_without_next_day_details() {
        let info = ClockOutInfo {
            next_shift: "シフト休".into(),
            ..ClockOutInfo::default()
        };
        let payload = build_payload(&test_config(), &NotificationEvent::ClockOut(info));
        let message = fragment(&payload, "message");
        assert_eq!(message["items"][0]["text"], "退勤します。次回は (シフト休)です。");
        assert_eq!(payload["comment"], "{}");
    }

    #[test]
    fn test_mention_resolution() {
        let config = test_config();
        assert_eq!(mention_ids(&config, "佐藤"), vec!["m-1".to_string()]);
        assert!(mention_ids(&config, "鈴木").is_empty());
        assert!(mention_ids(&config, "田中").is_empty());
        assert!(mention_ids(&config, "  ").is_empty());
    }

    #[test]
    fn test_effective_comment() {
        assert_eq!(clock_out_info("佐藤", " ").effective_comment(), "-");
        assert_eq!(clock_out_info("", " ").effective_comment(), "");
        assert_eq!(clock_out_info("佐藤", "了解").effective_comment(), "了解");
        assert_eq!(clock_out_info("", " 了解 ").effective_comment(), " 了解 ");
    }

    // --- Delivery ---

    /// Accepts one request, answers with `status_line` and `body`, and
    /// returns the request body it received.
    async fn serve_once(status_line: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/hook", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&buf).to_string();
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let length = text[..header_end]
                        .lines()
                        .find_map(|l| {
                            let (name, value) = l.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if buf.len() >= header_end + 4 + length {
                        break;
                    }
                }
            }
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let text = String::from_utf8_lossy(&buf).to_string();
            text.split_once("\r\n\r\n")
                .map(|(_, b)| b.to_string())
                .unwrap_or_default()
        });

        (url, handle)
    }

    fn local_notifier() -> TeamsWebhookNotifier {
        TeamsWebhookNotifier::with_client(Client::builder().no_proxy().build().unwrap())
    }

    #[test]
    fn test_empty_webhook_is_a_no_op() {
        let rt = Runtime::new().unwrap();
        let config = AppConfig {
            webhook_url: "  ".into(),
            ..test_config()
        };
        let result = rt.block_on(local_notifier().notify(
            &config,
            &NotificationEvent::ClockIn {
                work_mode: WorkMode::Office,
                comment: String::new(),
            },
        ));
        assert!(result.is_ok());
    }

    #[test]
    fn test_invalid_webhook_url() {
        let rt = Runtime::new().unwrap();
        let config = AppConfig {
            webhook_url: "not a url".into(),
            ..test_config()
        };
        let result = rt.block_on(local_notifier().notify(
            &config,
            &NotificationEvent::ClockOut(ClockOutInfo::default()),
        ));
        assert!(matches!(result, Err(NotificationError::InvalidTarget(_))));
    }

    #[test]
    fn test_accepted_post_and_debug_copy() {
        let rt = Runtime::new().unwrap();
        let dir = TempDir::new().unwrap();
        let debug_file = dir.path().join("debug").join("payload.json");

        let received = rt.block_on(async {
            let (url, server) = serve_once("202 Accepted", "").await;
            let config = AppConfig {
                webhook_url: url,
                payload_debug_file: Some(debug_file.clone()),
                ..test_config()
            };
            let event = NotificationEvent::ClockIn {
                work_mode: WorkMode::Remote,
                comment: "よろしくお願いします".into(),
            };
            local_notifier().notify(&config, &event).await.unwrap();
            server.await.unwrap()
        });

        let posted: Value = serde_json::from_str(&received).unwrap();
        assert_eq!(posted["userId"], "user-42");
        let saved: Value =
            serde_json::from_str(&std::fs::read_to_string(&debug_file).unwrap()).unwrap();
        assert_eq!(saved, posted);
    }

    #[test]
    fn test_rejected_post_reports_status() {
        let rt = Runtime::new().unwrap();
        let result = rt.block_on(async {
            let (url, server) = serve_once("500 Internal Server Error", "boom").await;
            let config = AppConfig {
                webhook_url: url,
                ..test_config()
            };
            let result = local_notifier()
                .notify(&config, &NotificationEvent::ClockOut(ClockOutInfo::default()))
                .await;
            server.await.unwrap();
            result
        });

        match result {
            Err(NotificationError::Status { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("expected a status error, got {:?}", other),
        }
    }
}
