//! Unit and integration tests for the PoW crate

#[cfg(test)]
mod pow_tests {
    use std::time::Duration;

    use kernel::id::ResourceId;

    use crate::domain::entities::{Challenge, SEED_LEN, Solution};
    use crate::domain::hashcash::{Hashcash, Solver, Verifier};
    use crate::domain::services::*;
    use crate::domain::value_objects::Difficulty;
    use crate::error::PowError;

    const TTL: Duration = Duration::from_secs(60);
    const ISSUED_AT_MS: i64 = 1_700_000_000_000;

    fn fixed_challenge(bits: u8) -> Challenge {
        Challenge::new(
            Difficulty::new(bits).unwrap(),
            ISSUED_AT_MS,
            [0x5A; SEED_LEN],
            ResourceId::from_bytes([0x42; 16]),
        )
    }

    fn first_invalid_counter(challenge: &[u8], difficulty: Difficulty) -> u64 {
        (0..).find(|&c| !verify_pow(challenge, c, difficulty)).unwrap()
    }

    #[test]
    fn test_solutions_are_sound() {
        for bits in [8, 12, 16] {
            let hashcash = Hashcash::new(bits, TTL).unwrap();
            let challenge = hashcash.issue().encode();
            let solution = hashcash.solve(&challenge).unwrap();

            let digest = compute_pow_hash(&challenge, solution.counter);
            assert!(count_leading_zero_bits(&digest) >= u32::from(bits));
            assert_eq!(hashcash.verify(&challenge, &solution.encode()), Ok(()));
        }
    }

    #[test]
    fn test_counter_bit_flips_are_rejected() {
        let hashcash = Hashcash::new(20, TTL).unwrap();
        let challenge = fixed_challenge(20).encode();
        let solution = hashcash.solve(&challenge).unwrap();

        assert_eq!(
            hashcash.verify_at(&challenge, &solution.encode(), ISSUED_AT_MS),
            Ok(())
        );

        for bit in 0..64 {
            let flipped = Solution::new(solution.counter ^ (1u64 << bit));
            assert!(
                matches!(
                    hashcash.verify_at(&challenge, &flipped.encode(), ISSUED_AT_MS),
                    Err(PowError::InsufficientWork { required: 20, .. })
                ),
                "bit {bit} flip accepted"
            );
        }
    }

    #[test]
    fn test_insufficient_work_reports_counts() {
        let hashcash = Hashcash::new(16, TTL).unwrap();
        let challenge = fixed_challenge(16).encode();
        let counter = first_invalid_counter(&challenge, Difficulty::new(16).unwrap());

        let err = hashcash
            .verify_at(&challenge, &counter.to_be_bytes(), ISSUED_AT_MS)
            .unwrap_err();
        match err {
            PowError::InsufficientWork { required, actual } => {
                assert_eq!(required, 16);
                assert!(actual < 16);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_freshness_window() {
        let hashcash = Hashcash::new(8, TTL).unwrap();
        let challenge = fixed_challenge(8).encode();
        let solution = hashcash.solve(&challenge).unwrap().encode();
        let ttl_ms = TTL.as_millis() as i64;

        assert_eq!(hashcash.verify_at(&challenge, &solution, ISSUED_AT_MS + ttl_ms), Ok(()));
        assert_eq!(hashcash.verify_at(&challenge, &solution, ISSUED_AT_MS - ttl_ms), Ok(()));
        assert_eq!(
            hashcash.verify_at(&challenge, &solution, ISSUED_AT_MS + ttl_ms + 1),
            Err(PowError::ExpiredChallenge)
        );
        assert_eq!(
            hashcash.verify_at(&challenge, &solution, ISSUED_AT_MS - ttl_ms - 1),
            Err(PowError::ExpiredChallenge)
        );
    }

    #[test]
    fn test_expiry_is_checked_before_the_solution() {
        let hashcash = Hashcash::new(8, TTL).unwrap();
        let challenge = fixed_challenge(8).encode();

        assert_eq!(
            hashcash.verify_at(&challenge, b"junk", ISSUED_AT_MS + 10 * 60_000),
            Err(PowError::ExpiredChallenge)
        );
    }

    #[test]
    fn test_solution_does_not_transfer_between_challenges() {
        let hashcash = Hashcash::new(16, TTL).unwrap();
        let a = fixed_challenge(16).encode();
        let mut other = fixed_challenge(16);
        other.seed = [0xA5; SEED_LEN];
        let b = other.encode();

        let solution = hashcash.solve(&a).unwrap().encode();
        assert_eq!(hashcash.verify_at(&a, &solution, ISSUED_AT_MS), Ok(()));
        assert!(matches!(
            hashcash.verify_at(&b, &solution, ISSUED_AT_MS),
            Err(PowError::InsufficientWork { .. })
        ));
    }

    #[test]
    fn test_solver_enforces_ceiling() {
        let server = Hashcash::new(12, TTL).unwrap();
        let client = Hashcash::new(10, TTL).unwrap();
        let challenge = server.issue().encode();

        assert_eq!(
            client.solve(&challenge),
            Err(PowError::DifficultyTooHigh {
                requested: 12,
                ceiling: 10
            })
        );
    }

    #[test]
    fn test_solver_accepts_easier_challenges() {
        let server = Hashcash::new(6, TTL).unwrap();
        let client = Hashcash::new(20, TTL).unwrap();
        let challenge = server.issue().encode();

        let solution = client.solve(&challenge).unwrap();
        assert_eq!(server.verify(&challenge, &solution.encode()), Ok(()));
    }

    #[test]
    fn test_verify_rejects_garbage() {
        let hashcash = Hashcash::new(8, TTL).unwrap();
        let challenge = fixed_challenge(8).encode();

        assert!(matches!(
            hashcash.verify_at(&[], &[0; 8], ISSUED_AT_MS),
            Err(PowError::MalformedChallenge(_))
        ));
        assert_eq!(
            hashcash.verify_at(&[7; 42], &[0; 8], ISSUED_AT_MS),
            Err(PowError::UnsupportedVersion(7))
        );
        assert_eq!(
            hashcash.verify_at(&challenge, &[0; 9], ISSUED_AT_MS),
            Err(PowError::MalformedSolution {
                expected: 8,
                actual: 9
            })
        );
    }

    #[test]
    fn test_sha256_known_value() {
        let hash = platform::crypto::sha256(b"hello");
        let expected =
            hex::decode("2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824")
                .unwrap();
        assert_eq!(hash.to_vec(), expected);
    }
}

#[cfg(test)]
mod quotes_tests {
    use std::collections::HashSet;

    use crate::domain::repository::QuoteRepository;
    use crate::error::QuoteError;
    use crate::infra::quotes::EmbeddedQuotes;

    #[test]
    fn test_parses_one_quote_per_line() {
        let quotes = EmbeddedQuotes::from_text("  first  \n\n\tsecond\n   \nthird");
        assert_eq!(quotes.len(), 3);
    }

    #[test]
    fn test_bundled_corpus_is_not_empty() {
        assert!(!EmbeddedQuotes::new().is_empty());
    }

    #[tokio::test]
    async fn test_get_quote_returns_corpus_member() {
        let text = "alpha\nbeta\ngamma";
        let corpus: HashSet<&str> = text.lines().collect();
        let quotes = EmbeddedQuotes::from_text(text);

        for _ in 0..32 {
            let quote = quotes.get_quote().await.unwrap();
            assert!(corpus.contains(quote.as_str()));
        }
    }

    #[tokio::test]
    async fn test_empty_corpus() {
        let quotes = EmbeddedQuotes::from_text("\n  \n");
        assert_eq!(quotes.get_quote().await, Err(QuoteError::Empty));
    }
}

#[cfg(test)]
mod handler_tests {
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Duration;

    use platform::framing::{DEFAULT_MAX_FRAME_LEN, FrameError, MessageStream};
    use tokio::io::{DuplexStream, duplex};
    use tokio::task::JoinHandle;
    use tokio::time::Instant;

    use crate::application::request_quote::{QuoteRequest, REQUEST_TOKEN};
    use crate::application::serve_connection::ConnectionHandler;
    use crate::domain::hashcash::{Hashcash, Solver};
    use crate::domain::services::verify_pow;
    use crate::domain::value_objects::Difficulty;
    use crate::error::{ClientError, PowError};
    use crate::infra::quotes::EmbeddedQuotes;

    const QUOTE: &str = "Measure twice, cut once.";

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    fn spawn_handler(
        bits: u8,
        corpus: &str,
        deadline: Duration,
    ) -> (MessageStream<DuplexStream>, JoinHandle<()>) {
        let (client, server) = duplex(DEFAULT_MAX_FRAME_LEN);
        let handler = ConnectionHandler::new(
            Arc::new(Hashcash::new(bits, Duration::from_secs(60)).unwrap()),
            Arc::new(EmbeddedQuotes::from_text(corpus)),
            DEFAULT_MAX_FRAME_LEN,
        );
        let task = tokio::spawn(async move {
            handler
                .handle(server, peer(), Instant::now() + deadline)
                .await;
        });
        (MessageStream::new(client, DEFAULT_MAX_FRAME_LEN), task)
    }

    async fn request_challenge(stream: &mut MessageStream<DuplexStream>) -> Vec<u8> {
        stream.write_message(REQUEST_TOKEN).await.unwrap();
        stream.read_message().await.unwrap()
    }

    #[tokio::test]
    async fn test_happy_path() {
        let (mut stream, task) = spawn_handler(8, QUOTE, Duration::from_secs(5));

        let challenge = request_challenge(&mut stream).await;
        let solution = Hashcash::new(8, Duration::from_secs(60))
            .unwrap()
            .solve(&challenge)
            .unwrap();
        stream.write_message(&solution.encode()).await.unwrap();

        let quote = stream.read_message().await.unwrap();
        assert_eq!(String::from_utf8(quote).unwrap(), QUOTE);

        // One request per connection.
        assert!(matches!(
            stream.read_message().await,
            Err(FrameError::ConnectionClosed)
        ));
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_bad_solution_is_a_silent_close() {
        let (mut stream, task) = spawn_handler(16, QUOTE, Duration::from_secs(5));

        let challenge = request_challenge(&mut stream).await;
        let difficulty = Difficulty::new(16).unwrap();
        let bad = (0u64..)
            .find(|&c| !verify_pow(&challenge, c, difficulty))
            .unwrap();
        stream.write_message(&bad.to_be_bytes()).await.unwrap();

        assert!(matches!(
            stream.read_message().await,
            Err(FrameError::ConnectionClosed)
        ));
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_malformed_solution_is_a_silent_close() {
        let (mut stream, task) = spawn_handler(8, QUOTE, Duration::from_secs(5));

        request_challenge(&mut stream).await;
        stream.write_message(b"abc").await.unwrap();

        assert!(matches!(
            stream.read_message().await,
            Err(FrameError::ConnectionClosed)
        ));
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_quote_failure_sends_nothing() {
        let (mut stream, task) = spawn_handler(8, "", Duration::from_secs(5));

        let challenge = request_challenge(&mut stream).await;
        let solution = Hashcash::new(8, Duration::from_secs(60))
            .unwrap()
            .solve(&challenge)
            .unwrap();
        stream.write_message(&solution.encode()).await.unwrap();

        assert!(matches!(
            stream.read_message().await,
            Err(FrameError::ConnectionClosed)
        ));
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_idle_peer_is_released_at_deadline() {
        let (mut stream, task) = spawn_handler(8, QUOTE, Duration::from_millis(100));

        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("handler outlived its deadline")
            .unwrap();
        assert!(matches!(
            stream.read_message().await,
            Err(FrameError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_oversized_request_is_dropped_unread() {
        // Declares a 4 GiB frame; the handler must neither allocate nor reply.
        let mock = tokio_test::io::Builder::new()
            .read(&[0xFF, 0xFF, 0xFF, 0xFF])
            .build();
        let handler = ConnectionHandler::new(
            Arc::new(Hashcash::new(8, Duration::from_secs(60)).unwrap()),
            Arc::new(EmbeddedQuotes::from_text(QUOTE)),
            DEFAULT_MAX_FRAME_LEN,
        );

        handler
            .handle(mock, peer(), Instant::now() + Duration::from_secs(1))
            .await;
    }

    #[tokio::test]
    async fn test_quote_request_against_handler() {
        let (client, server) = duplex(DEFAULT_MAX_FRAME_LEN);
        let handler = ConnectionHandler::new(
            Arc::new(Hashcash::new(8, Duration::from_secs(60)).unwrap()),
            Arc::new(EmbeddedQuotes::from_text(QUOTE)),
            DEFAULT_MAX_FRAME_LEN,
        );
        let task = tokio::spawn(async move {
            handler
                .handle(server, peer(), Instant::now() + Duration::from_secs(5))
                .await;
        });

        let request = QuoteRequest::new(
            Arc::new(Hashcash::new(20, Duration::from_secs(60)).unwrap()),
            Duration::from_secs(5),
            DEFAULT_MAX_FRAME_LEN,
        );
        assert_eq!(request.exchange(client).await.unwrap(), QUOTE);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_quote_request_refuses_hard_challenge() {
        let (client, server) = duplex(DEFAULT_MAX_FRAME_LEN);
        let handler = ConnectionHandler::new(
            Arc::new(Hashcash::new(24, Duration::from_secs(60)).unwrap()),
            Arc::new(EmbeddedQuotes::from_text(QUOTE)),
            DEFAULT_MAX_FRAME_LEN,
        );
        let task = tokio::spawn(async move {
            handler
                .handle(server, peer(), Instant::now() + Duration::from_secs(5))
                .await;
        });

        let request = QuoteRequest::new(
            Arc::new(Hashcash::new(8, Duration::from_secs(60)).unwrap()),
            Duration::from_secs(5),
            DEFAULT_MAX_FRAME_LEN,
        );
        let err = request.exchange(client).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Pow(PowError::DifficultyTooHigh {
                requested: 24,
                ceiling: 8
            })
        ));
        task.await.unwrap();
    }
}

#[cfg(test)]
mod server_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use kernel::error::kind::ErrorKind;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::sync::watch;
    use tokio::task::JoinHandle;
    use tokio::time::Instant;

    use crate::application::config::{ClientConfig, PowConfig, ServerConfig};
    use crate::domain::hashcash::Hashcash;
    use crate::error::ClientError;
    use crate::infra::quotes::EmbeddedQuotes;
    use crate::presentation::client::Client;
    use crate::presentation::server::Server;
    use crate::{AppResult, RunSummary};

    type TestServer = Server<Hashcash, EmbeddedQuotes>;

    fn server_config(bits: u8) -> ServerConfig {
        ServerConfig {
            addr: "127.0.0.1:0".to_string(),
            pow: PowConfig {
                difficulty_bits: bits,
                ..PowConfig::default()
            },
            ..ServerConfig::default()
        }
    }

    async fn start(config: ServerConfig) -> (Arc<TestServer>, JoinHandle<AppResult<()>>) {
        let hashcash = config.pow.hashcash().unwrap();
        let server = Arc::new(
            Server::bind(config, Arc::new(hashcash), Arc::new(EmbeddedQuotes::new()))
                .await
                .unwrap(),
        );
        let running = Arc::clone(&server);
        let task = tokio::spawn(async move { running.run().await });
        (server, task)
    }

    fn client_for(server: &TestServer, bits: u8) -> Client<Hashcash> {
        let config = ClientConfig {
            server_addr: server.local_addr().to_string(),
            pow: PowConfig {
                difficulty_bits: bits,
                ..PowConfig::default()
            },
            ..ClientConfig::default()
        };
        let solver = config.pow.hashcash().unwrap();
        Client::new(config, Arc::new(solver))
    }

    async fn wait_for_handlers(server: &TestServer, n: usize) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while server.active_handlers() < n {
            assert!(Instant::now() < deadline, "handlers never started");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    async fn run_requests(bits: u8, count: usize) {
        let (server, task) = start(server_config(bits)).await;
        let client = client_for(&server, bits);
        let (_tx, shutdown) = watch::channel(false);

        let summary = client.start(count, shutdown).await;
        assert_eq!(
            summary,
            RunSummary {
                succeeded: count,
                failed: 0,
                cancelled: false
            }
        );

        server.stop().await;
        task.await.unwrap().unwrap();
        assert_eq!(server.active_handlers(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_end_to_end_low_difficulty() {
        run_requests(4, 100).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_end_to_end_moderate_difficulty() {
        run_requests(12, 20).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ignore = "slow: full default difficulty"]
    async fn test_end_to_end_default_difficulty() {
        run_requests(20, 100).await;
    }

    #[tokio::test]
    async fn test_get_quote_returns_non_empty_text() {
        let (server, task) = start(server_config(6)).await;
        let quote = client_for(&server, 6).get_quote().await.unwrap();
        assert!(!quote.trim().is_empty());

        server.stop().await;
        task.await.unwrap().unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_sheds_when_handlers_and_queue_are_full() {
        let (server, task) = start(ServerConfig {
            workers: 1,
            max_handlers: Some(1),
            accept_timeout: Duration::from_millis(100),
            conn_deadline: Duration::from_millis(800),
            ..server_config(8)
        })
        .await;
        let addr = server.local_addr();

        // Holds the only handler slot until its deadline.
        let _stalled = TcpStream::connect(addr).await.unwrap();
        wait_for_handlers(&server, 1).await;

        // Fills the queue.
        let _queued = TcpStream::connect(addr).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        let mut shed = TcpStream::connect(addr).await.unwrap();
        shed.write_all(b"\0\0\0\x09challenge").await.unwrap();
        let started = Instant::now();
        let mut buf = [0u8; 64];
        let n = tokio::time::timeout(Duration::from_millis(600), shed.read(&mut buf))
            .await
            .expect("shed connection was not closed")
            .unwrap_or(0);
        assert_eq!(n, 0, "shed connection received a challenge");
        assert!(started.elapsed() < Duration::from_millis(600));

        server.stop().await;
        task.await.unwrap().unwrap();
        assert_eq!(server.active_handlers(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stop_drains_stalled_connections() {
        let conn_deadline = Duration::from_millis(300);
        let (server, task) = start(ServerConfig {
            workers: 4,
            conn_deadline,
            ..server_config(8)
        })
        .await;
        let addr = server.local_addr();

        let mut stalled = Vec::new();
        for _ in 0..3 {
            stalled.push(TcpStream::connect(addr).await.unwrap());
        }
        wait_for_handlers(&server, 3).await;

        let started = Instant::now();
        server.stop().await;
        assert!(started.elapsed() >= Duration::from_millis(150));
        assert_eq!(server.active_handlers(), 0);
        task.await.unwrap().unwrap();

        for mut socket in stalled {
            let mut buf = [0u8; 8];
            assert_eq!(socket.read(&mut buf).await.unwrap_or(0), 0);
        }
    }

    #[tokio::test]
    async fn test_oversized_slot_counts_do_not_panic() {
        let (server, task) = start(ServerConfig {
            workers: usize::MAX,
            max_handlers: Some(usize::MAX),
            ..server_config(4)
        })
        .await;

        let quote = client_for(&server, 4).get_quote().await.unwrap();
        assert!(!quote.is_empty());

        server.stop().await;
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_stop_is_idempotent_and_safe_before_run() {
        let config = server_config(8);
        let hashcash = config.pow.hashcash().unwrap();
        let server = Server::bind(config, Arc::new(hashcash), Arc::new(EmbeddedQuotes::new()))
            .await
            .unwrap();

        server.stop().await;
        server.stop().await;
        assert!(server.run().await.is_ok());
    }

    #[tokio::test]
    async fn test_bind_conflict_is_fatal() {
        let (server, task) = start(server_config(8)).await;
        let config = ServerConfig {
            addr: server.local_addr().to_string(),
            ..server_config(8)
        };

        let hashcash = config.pow.hashcash().unwrap();
        let err = Server::bind(config, Arc::new(hashcash), Arc::new(EmbeddedQuotes::new()))
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Fatal);
        assert!(err.is_fatal());

        server.stop().await;
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_client_reports_dial_failure() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = ClientConfig {
            server_addr: addr.to_string(),
            ..ClientConfig::default()
        };
        let client = Client::new(config, Arc::new(Hashcash::default()));
        let err = client.get_quote().await.unwrap_err();
        assert!(matches!(err, ClientError::Dial { .. }));
        assert_eq!(err.kind(), ErrorKind::Transport);

        let (_tx, shutdown) = watch::channel(false);
        let summary = client.start(2, shutdown).await;
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.succeeded, 0);
    }

    #[tokio::test]
    async fn test_client_checks_shutdown_before_each_request() {
        let client = Client::new(ClientConfig::default(), Arc::new(Hashcash::default()));
        let (tx, shutdown) = watch::channel(false);
        tx.send_replace(true);

        let summary = client.start(5, shutdown).await;
        assert_eq!(
            summary,
            RunSummary {
                succeeded: 0,
                failed: 0,
                cancelled: true
            }
        );
    }
}
