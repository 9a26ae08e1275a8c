mod payload;
mod request;
mod response;

pub use payload::{
    AuthenticationPayload, CancelPayload, CardReader, CollectPayload, Requirement, SignPayload,
};
pub use request::{Operation, Request, Response};
pub use response::{
    AuthenticateResponse, CancelResponse, Cert, CollectResponse, CollectStatus, CompletionData,
    Device, ErrorCode, ErrorResponse, HintCode, SignResponse, User,
};
