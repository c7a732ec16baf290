use nom::bytes::complete::{tag_no_case, take_until};
use nom::character::complete::{char, space0};
use nom::sequence::{delimited, preceded, tuple};
use nom::IResult;

//----- Parser -----------------------------------------------------------------

// Parse the argument of a MAIL command, "From:<reverse-path>".
// The null reverse path "<>" is allowed and anything after the closing
// bracket, such as ESMTP parameters, is ignored.
pub(crate) fn reverse_path(arg: &str) -> Option<&str> {
    path("from:", arg).ok().map(|(_, path)| path)
}

// Parse the argument of a RCPT command, "To:<forward-path>"
pub(crate) fn forward_path(arg: &str) -> Option<&str> {
    path("to:", arg)
        .ok()
        .map(|(_, path)| path)
        .filter(|path| !path.is_empty())
}

fn path<'a>(keyword: &'static str, input: &'a str) -> IResult<&'a str, &'a str> {
    preceded(
        tuple((tag_no_case(keyword), space0)),
        delimited(char('<'), take_until(">"), char('>')),
    )(input)
}

//---- Tests --------------------------------------------------------------------
