//! Edge case tests for the queue system

#[cfg(test)]
mod tests {
    use crate::queue::api::{
        item_fn, ConsumerGroupConfig, EngineOptions, Message, ProcessingMode, PublishOutcome,
    };
    use crate::queue::tests::support::{eventually, quiet_engine, test_options, Recorder};
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_capacity_of_one_still_delivers_everything() {
        let options = EngineOptions {
            max_queue_size: 1,
            ..test_options()
        };
        let engine = quiet_engine::<u32>(options);
        let recorder = Recorder::new();
        engine
            .register_consumer_group(
                ConsumerGroupConfig::new("narrow")
                    .with_item_handler(recorder.item_handler())
                    .max_parallelism(1),
            )
            .unwrap();

        for value in 0..25 {
            engine.publish(value).await.unwrap();
        }
        engine.stop().await;

        assert_eq!(recorder.items(), (0..25).collect::<Vec<_>>());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_batch_size_of_one_behaves_like_single_mode() {
        let engine = quiet_engine::<u32>(test_options());
        let recorder = Recorder::new();
        engine
            .register_consumer_group(
                ConsumerGroupConfig::new("unit-batches")
                    .with_batch_handler(recorder.batch_handler())
                    .batched(1)
                    .max_parallelism(1),
            )
            .unwrap();

        for value in 0..3 {
            engine.publish(value).await.unwrap();
        }
        engine.stop().await;

        assert_eq!(recorder.batches(), vec![vec![0], vec![1], vec![2]]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_single_mode_ignores_configured_batch_size() {
        let engine = quiet_engine::<u32>(test_options());
        let recorder = Recorder::new();
        let config = ConsumerGroupConfig::new("single")
            .with_item_handler(recorder.item_handler())
            .mode(ProcessingMode::Single);
        assert_eq!(config.batch_size, 10);
        engine.register_consumer_group(config).unwrap();

        engine.publish(7).await.unwrap();
        // Delivered without waiting for nine more items
        eventually("single item delivery", || recorder.len() == 1).await;
        engine.stop().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stop_with_empty_channels_is_prompt() {
        let engine = quiet_engine::<u32>(test_options());
        let recorder = Recorder::new();
        engine
            .register_consumer_group(
                ConsumerGroupConfig::new("idle")
                    .with_item_handler(recorder.item_handler())
                    .delay_between_batches(Duration::from_secs(60)),
            )
            .unwrap();
        engine.publish(1).await.unwrap();
        eventually("first item", || recorder.len() == 1).await;

        // The loop is inside its inter-batch pause
        tokio::time::timeout(Duration::from_secs(2), engine.stop())
            .await
            .expect("stop must interrupt the inter-batch delay");
    }

    #[tokio::test]
    async fn test_payloads_are_cloned_per_group() {
        let engine = quiet_engine::<Vec<String>>(test_options());
        let first = Recorder::new();
        let second = Recorder::new();
        for (name, recorder) in [("first", &first), ("second", &second)] {
            engine
                .register_consumer_group(
                    ConsumerGroupConfig::new(name).with_item_handler(recorder.item_handler()),
                )
                .unwrap();
        }

        let payload = vec!["ada".to_string(), "grace".to_string()];
        assert_eq!(
            engine.publish(payload.clone()).await.unwrap(),
            PublishOutcome::Accepted
        );
        engine.stop().await;

        assert_eq!(first.items(), vec![payload.clone()]);
        assert_eq!(second.items(), vec![payload]);
    }

    #[tokio::test]
    async fn test_default_group_name_is_unique() {
        let engine = quiet_engine::<u32>(test_options());
        for _ in 0..3 {
            engine
                .register_consumer_group(
                    ConsumerGroupConfig::default()
                        .with_item_handler(item_fn(|_: u32| async { Ok(()) })),
                )
                .unwrap();
        }
        assert_eq!(engine.group_count(), 3);
        engine.stop().await;
    }

    #[test]
    fn test_message_records_enqueue_time() {
        let message = Message::new(5u8);
        assert!(message.age() < Duration::from_secs(5));
        assert_eq!(message.into_payload(), 5);
    }
}
