//! Lists the chunks of a music resource read from stdin.
use std::io::Read;

fn main() {
    let mut data = Vec::new();
    if let Err(err) = std::io::stdin().read_to_end(&mut data) {
        eprintln!("read error: {}", err);
        std::process::exit(1);
    }

    let res = match imres::Resource::read(&data) {
        Ok(res) => res,
        Err(err) => {
            eprintln!("{}", err);
            std::process::exit(1);
        }
    };
    println!("family: {} ({:?})", res.family, res.format);

    for chunk in res.chunks() {
        match chunk {
            Ok((id, payload)) => println!("{}: {} bytes", id, payload.len()),
            Err(err) => {
                println!("error: {}", err);
                break;
            }
        }
    }
}
