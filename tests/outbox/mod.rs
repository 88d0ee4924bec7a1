mod atomicity;
mod delivery;
mod friend_request;
mod shutdown;
