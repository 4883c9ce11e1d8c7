// Licensed under the MIT License.

//! Shows that tasks enqueued under the same key run one at a time, in
//! enqueue order, while different keys run concurrently.

use coro_rt::dispatcher::{Dispatcher, DispatcherConfig};
use coro_rt::sequencer::{Sequencer, SequencerConfig};

fn main() {
    let dispatcher = Dispatcher::new(&DispatcherConfig::new(4, 1));
    let sequencer = Sequencer::new(dispatcher.clone(), &SequencerConfig::default());

    futures::executor::block_on(async {
        let mut handles = Vec::new();
        for account in ["alice", "bob"] {
            for step in 0..3 {
                handles.push(sequencer.enqueue(account, move |ctx| async move {
                    ctx.yield_now().await;
                    println!("{account}: step {step}");
                    Ok::<_, coro_rt::task::chain::TaskError>(())
                }));
            }
        }

        for handle in handles {
            handle.await.expect("demo task does not fail");
        }

        sequencer
            .barrier(|_ctx| async { Ok::<_, coro_rt::task::chain::TaskError>(()) })
            .await
            .expect("barrier does not fail");
        println!("barrier: every key session above has finished");
    });

    dispatcher.drain();
}
