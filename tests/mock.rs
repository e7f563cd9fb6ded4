use std::cell::{RefCell, RefMut};
use std::rc::Rc;

use mockall::*;

#[automock]
pub trait Spy {
	fn trigger(&self, value: String);
}

#[derive(Clone)]
pub struct SharedMock(Rc<RefCell<MockSpy>>);

impl SharedMock {
	pub fn new() -> SharedMock {
		SharedMock(Rc::new(RefCell::new(MockSpy::new())))
	}

	pub fn get(&self) -> RefMut<'_, MockSpy> {
		self.0.borrow_mut()
	}

	/// Subscriber callback forwarding every value to the spy.
	pub fn callback(&self) -> impl FnMut(&String) + 'static {
		let mock = self.clone();
		move |value: &String| mock.get().trigger(value.clone())
	}
}
