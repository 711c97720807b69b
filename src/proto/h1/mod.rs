pub(crate) use self::dispatch::Dispatcher;

mod conn;
mod date;
mod dispatch;
mod pipeline;
mod role;
