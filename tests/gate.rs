use std::cell::RefCell;
use std::rc::Rc;

use futures::channel::oneshot;

/// Holds resolvers at an await point until the test opens it.
#[derive(Clone, Default)]
pub struct Gate {
	waiting: Rc<RefCell<Vec<oneshot::Sender<()>>>>,
}

impl Gate {
	pub fn new() -> Self {
		Self::default()
	}

	pub async fn wait(&self) {
		let (sender, receiver) = oneshot::channel();
		self.waiting.borrow_mut().push(sender);
		let _ = receiver.await;
	}

	/// Releases everything currently waiting.
	pub fn open(&self) -> usize {
		let waiting: Vec<_> = self.waiting.borrow_mut().drain(..).collect();
		let count = waiting.len();
		for sender in waiting {
			let _ = sender.send(());
		}
		count
	}

	pub fn waiting(&self) -> usize {
		self.waiting.borrow().len()
	}
}
