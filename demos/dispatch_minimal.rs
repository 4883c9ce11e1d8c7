// Licensed under the MIT License.

use coro_rt::dispatcher::{Dispatcher, DispatcherConfig};
use coro_rt::task::types::{QueueTarget, TaskKind};
use coro_rt::task::Task;

fn main() {
    let dispatcher = Dispatcher::new(&DispatcherConfig::new(4, 1));

    for i in 0..8 {
        dispatcher
            .post(Task::new(
                TaskKind::Standalone,
                false,
                QueueTarget::Any,
                Box::pin(async move {
                    println!("task {i} running on a coroutine worker");
                }),
            ))
            .expect("dispatcher accepts posts before drain");
    }

    dispatcher.drain();
    println!("all tasks drained");
}
