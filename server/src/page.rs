//! The single-page form served at `/`.

pub const INDEX_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Database Documentation Generator</title>
<style>
  body { font-family: system-ui, sans-serif; max-width: 44rem; margin: 2rem auto; padding: 0 1rem; }
  label { display: block; margin-top: .75rem; font-weight: 600; }
  input, select, textarea { width: 100%; padding: .4rem; box-sizing: border-box; }
  .hidden { display: none; }
  .error { color: #b00020; }
  progress { width: 100%; height: 1.25rem; }
  #tables label { font-weight: normal; }
</style>
</head>
<body>
<h1>Database Documentation Generator</h1>

<form id="connect">
  <label for="connection_type">Connection type</label>
  <select id="connection_type" name="connection_type">
    <option value="basic">Host / port / service</option>
    <option value="tns">TNS descriptor</option>
    <option value="connection_string">Connection string</option>
    <option value="sqlite">SQLite file</option>
  </select>

  <div data-kind="basic">
    <label for="host">Host</label><input id="host" name="host">
    <label for="port">Port</label><input id="port" name="port" value="1521">
    <label for="service_name">Service name</label><input id="service_name" name="service_name">
  </div>
  <div data-kind="tns" class="hidden">
    <label for="tns_config">TNS descriptor</label>
    <textarea id="tns_config" name="tns_config" rows="6"></textarea>
  </div>
  <div data-kind="basic tns">
    <label for="username">Username</label><input id="username" name="username">
    <label for="password">Password</label><input id="password" name="password" type="password">
  </div>
  <div data-kind="connection_string" class="hidden">
    <label for="connection_string">Connection string</label>
    <input id="connection_string" name="connection_string" placeholder="user/password@host:1521/service">
  </div>
  <div data-kind="sqlite" class="hidden">
    <label for="sqlite_path">Database file</label><input id="sqlite_path" name="sqlite_path">
  </div>

  <p><button type="submit">Connect</button></p>
  <p id="form-error" class="error"></p>
</form>

<section id="select" class="hidden">
  <h2>Tables</h2>
  <div id="tables"></div>
  <p><button id="generate">Generate documentation</button></p>
</section>

<section id="status" class="hidden">
  <h2>Progress</h2>
  <progress id="bar" max="100" value="0"></progress>
  <p id="message"></p>
  <p><a id="download" class="hidden">Download document</a></p>
</section>

<script>
const $ = (id) => document.getElementById(id);
let jobId = null;

function showKind() {
  const kind = $("connection_type").value;
  document.querySelectorAll("[data-kind]").forEach((el) => {
    el.classList.toggle("hidden", !el.dataset.kind.split(" ").includes(kind));
  });
}
$("connection_type").addEventListener("change", showKind);
showKind();

async function post(url, body) {
  const res = await fetch(url, {
    method: "POST",
    headers: { "Content-Type": "application/json" },
    body: JSON.stringify(body),
  });
  return res.json();
}

$("connect").addEventListener("submit", async (ev) => {
  ev.preventDefault();
  $("form-error").textContent = "";
  const form = Object.fromEntries(new FormData(ev.target).entries());
  const submitted = await post("/", form);
  if (submitted.status !== "success") {
    const details = Object.values(submitted.errors || {}).flat().join("; ");
    $("form-error").textContent = submitted.message + (details ? ": " + details : "");
    return;
  }
  jobId = submitted.job_id;
  const listed = await post("/tables", { job_id: jobId });
  if (listed.status !== "success") {
    $("form-error").textContent = listed.message;
    return;
  }
  $("tables").innerHTML = "";
  for (const name of listed.tables) {
    const label = document.createElement("label");
    const box = document.createElement("input");
    box.type = "checkbox";
    box.value = name;
    box.checked = true;
    box.style.width = "auto";
    label.append(box, " ", name);
    $("tables").append(label);
  }
  $("select").classList.remove("hidden");
});

$("generate").addEventListener("click", async () => {
  const selected = [...document.querySelectorAll("#tables input:checked")].map((b) => b.value);
  const started = await post("/generate", { job_id: jobId, selected_tables: selected });
  $("status").classList.remove("hidden");
  if (started.status !== "success") {
    $("message").textContent = started.message;
    return;
  }
  poll();
});

async function poll() {
  const res = await fetch("/progress/" + encodeURIComponent(jobId));
  const job = await res.json();
  $("bar").value = job.percent || 0;
  $("message").textContent = job.message;
  if (job.status === "completed") {
    const link = $("download");
    link.href = "/download/" + encodeURIComponent(job.filename);
    link.classList.remove("hidden");
  } else if (job.status !== "error") {
    setTimeout(poll, 1000);
  }
}
</script>
</body>
</html>
"##;
